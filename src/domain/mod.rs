// Domain layer: value types and the ports the relay drives. Concrete devices and feeds live in adapters.

pub mod model;
pub mod ports;
