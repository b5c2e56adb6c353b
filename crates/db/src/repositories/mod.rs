pub mod detection_repo;
pub mod safe_zone_repo;
pub mod tracking_repo;

pub use detection_repo::DetectionRepo;
pub use safe_zone_repo::SafeZoneRepo;
pub use tracking_repo::TrackingRepo;
