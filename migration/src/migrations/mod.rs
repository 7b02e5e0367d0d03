pub mod m202608070001_create_users;
pub mod m202608070002_create_courses;
pub mod m202608070003_create_schedule_exceptions;
pub mod m202608070004_create_attendance;
pub mod m202608070005_create_leave_requests;
