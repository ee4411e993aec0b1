pub mod bug;
pub mod execution;
pub mod feature;
pub mod project;
pub mod tag;
pub mod test_case;
pub mod test_run;
