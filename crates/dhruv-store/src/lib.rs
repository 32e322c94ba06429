//! SQLite persistence for Dhruv.
//!
//! One [`Store`] owns a single connection guarded by a mutex. Operations are
//! grouped by table family:
//!
//! - users and bearer tokens
//! - chats, messages and stream ids
//! - water and calorie intake logs, plus the IST daily summary
//! - user memories
//!
//! The agent reaches the store through the narrow [`IntakeBackend`] and
//! [`MemoryBackend`] traits so tools can be tested against other backends.

pub mod backend;
pub mod error;
pub mod ist;
pub mod store;
pub mod types;
pub mod validation;

pub use backend::{IntakeBackend, MemoryBackend};
pub use error::{Result, StoreError};
pub use ist::{IST_LABEL, IstDay, round2};
pub use store::Store;
pub use types::{
    CalorieIntake, Chat, DailyIntakeSummary, MealCalories, MemoryFilter, MemoryRecord,
    MemoryUpdate, NewCalorieIntake, NewMemory, NewWaterIntake, ProfileUpdate, StoredMessage, User,
    UserProfile, WaterByUnit, WaterIntake,
};
pub use validation::ValidationError;
