//! IEC 60870-5-104 type definitions.
//!
//! - `Apci` - control field and frame kind (I/S/U)
//! - `Asdu` - Application Service Data Unit
//! - `TypeId` - Type identification
//! - `Cot` - Cause of transmission

mod apci;
mod asdu;
mod cot;
mod type_id;

pub use apci::*;
pub use asdu::*;
pub use cot::*;
pub use type_id::*;
