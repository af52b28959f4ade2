pub mod annotations;
pub mod config;
pub mod entities;
pub mod error;
pub mod paths;

#[cfg(test)]
pub mod test_utils;
