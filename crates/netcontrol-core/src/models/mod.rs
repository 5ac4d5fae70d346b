//! Wire types shared by the client and the server.
//!
//! - `User`, `AuthResponse`: identity payloads from `/api/auth/*`
//! - `Device`, `DeviceAction`: devices on the managed network
//! - `BlockedSite`: entries of the blocked-site list
//! - `Schedule`: blocking windows

pub mod device;
pub mod schedule;
pub mod site;
pub mod user;

pub use device::{BlockDeviceRequest, Device, DeviceAction, DeviceStatus};
pub use schedule::{Schedule, ScheduleAction};
pub use site::BlockedSite;
pub use user::{AuthResponse, LoginRequest, RegisterRequest, User};
