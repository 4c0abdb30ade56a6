pub mod dataset;
pub mod user;

pub use dataset::{Dataset, DatasetDetail, DATASET_DETAIL_SELECT};
pub use user::{PlatformStats, User, UserProfile, USER_COLUMNS};
