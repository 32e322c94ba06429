//! Narrow traits the agent tools and memory pipeline depend on.
//!
//! [`Store`] implements both; tests substitute failing or recording backends.

use uuid::Uuid;

use crate::error::Result;
use crate::store::Store;
use crate::types::{
    CalorieIntake, MemoryRecord, NewCalorieIntake, NewMemory, NewWaterIntake, WaterIntake,
};

/// Write access to the intake logs.
pub trait IntakeBackend: Send + Sync {
    fn add_water_intake(&self, user_id: Uuid, entry: NewWaterIntake) -> Result<WaterIntake>;

    fn add_calorie_intake(&self, user_id: Uuid, entry: NewCalorieIntake) -> Result<CalorieIntake>;
}

/// Insert and list user memories.
pub trait MemoryBackend: Send + Sync {
    fn add_memory(&self, user_id: Uuid, memory: NewMemory) -> Result<MemoryRecord>;

    /// Active memories, most important first.
    fn active_memories(&self, user_id: Uuid, limit: usize) -> Result<Vec<MemoryRecord>>;
}

impl IntakeBackend for Store {
    fn add_water_intake(&self, user_id: Uuid, entry: NewWaterIntake) -> Result<WaterIntake> {
        Store::add_water_intake(self, user_id, entry)
    }

    fn add_calorie_intake(&self, user_id: Uuid, entry: NewCalorieIntake) -> Result<CalorieIntake> {
        Store::add_calorie_intake(self, user_id, entry)
    }
}

impl MemoryBackend for Store {
    fn add_memory(&self, user_id: Uuid, memory: NewMemory) -> Result<MemoryRecord> {
        Store::add_memory(self, user_id, memory)
    }

    fn active_memories(&self, user_id: Uuid, limit: usize) -> Result<Vec<MemoryRecord>> {
        Store::active_memories(self, user_id, limit)
    }
}
