mod helpers;

mod attendance_tests;
mod trip_tests;
mod user_tests;
