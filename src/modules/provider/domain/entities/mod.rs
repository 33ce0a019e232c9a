pub mod movie_data;

pub use movie_data::*;
