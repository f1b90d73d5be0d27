pub mod hint;
pub mod print;
