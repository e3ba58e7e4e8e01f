pub mod attendance_service;
pub mod error;
pub mod geo;
pub mod tracking_service;
pub mod trip_service;
pub mod user_service;
pub mod visit_service;

#[cfg(test)]
mod tests;
