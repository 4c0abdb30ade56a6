pub mod datasets;
pub mod error;
pub mod fields;
pub mod identity;
pub mod moderation;

pub use datasets::{DatasetFile, DatasetPatch, DatasetRepository, FeedFilters, IncomingFile, NewDataset};
pub use error::{ConflictKind, ServiceError, ServiceResult};
pub use identity::{
    AdminCreateUserRequest, AdminUserPatch, AuthSession, ForgotPasswordRequest, IdentityRegistry, LoginRequest,
    PasswordResetIssued, PictureUpload, ProfilePatch, ResetPasswordRequest, SignupRequest,
};
pub use moderation::{ModerationAction, ModerationEngine, StatusChangeRequest};
