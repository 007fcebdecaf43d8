// [libs/domain/models/src/lib.rs]
/*!
 * =================================================================
 * APARATO: DOMAIN MODELS BARREL (V1.0)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: CONTRATOS SOBERANOS DE DISPOSITIVOS, TAREAS Y ASIGNACIONES
 *
 * Tipos compartidos entre el almacén (store), el cliente del worker y el
 * controlador. Ningún tipo de este crate realiza I/O.
 * =================================================================
 */

pub mod api;
pub mod assignment;
pub mod device;
pub mod device_id;
pub mod heartbeat;
pub mod task;

pub use assignment::{Assignment, AssignmentStatus};
pub use device::{Capabilities, Device, DeviceRole, DeviceStatus};
pub use heartbeat::HeartbeatSample;
pub use task::{Task, TaskStatus};
