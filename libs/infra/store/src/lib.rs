// [libs/infra/store/src/lib.rs]
/*!
 * =================================================================
 * APARATO: STORE LIBRARY BARREL
 * RESPONSABILIDAD: EXPOSICIÓN PÚBLICA DE CLIENTE, ESQUEMA Y REPOSITORIOS
 *
 * `Tasks.Assign` (TaskRepository::assign) is the single linearization
 * point for placement (§5) — every other component funnels through this
 * crate rather than touching SQL directly.
 * =================================================================
 */

pub mod client;
pub mod errors;
pub mod repositories;
pub mod schema;
pub mod time;

pub use client::StoreClient;
pub use errors::StoreError;
pub use repositories::{
    AssignmentRepository, DeviceRepository, HeartbeatRepository, NewTask, TaskRepository,
};
