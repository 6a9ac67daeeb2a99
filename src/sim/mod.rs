pub mod event;
pub mod level;
pub mod run;
pub mod save;
pub mod step;
pub mod swap;
pub mod world;
