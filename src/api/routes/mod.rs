pub mod health;
pub mod run;
