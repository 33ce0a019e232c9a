pub mod entities;

pub use entities::movie_data::{ExtendedFields, MinimalFields};
