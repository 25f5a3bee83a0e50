pub mod prelude;

pub mod document_uploads;
pub mod products;
pub mod users;
