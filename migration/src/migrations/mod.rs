pub mod m202608200001_create_users;
pub mod m202608200002_create_attendance_sessions;
pub mod m202608200003_create_tracking_points;
pub mod m202608200004_create_trips;
pub mod m202608200005_create_visits;
