pub mod attendance_session;
pub mod tracking_point;
pub mod trip;
pub mod user;
pub mod visit;

pub use attendance_session::Entity as AttendanceSession;
pub use tracking_point::Entity as TrackingPoint;
pub use trip::Entity as Trip;
pub use user::Entity as User;
pub use visit::Entity as Visit;
