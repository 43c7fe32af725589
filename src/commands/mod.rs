pub mod catalogs;
pub mod docx;
pub mod resolve;
pub mod scan;
pub mod substitute;
