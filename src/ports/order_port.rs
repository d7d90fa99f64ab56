//! Order sink port. The core hands off orders; execution, persistence and
//! confirmation belong to the implementation.

use crate::domain::allocator::Order;
use crate::domain::error::SiegfriedError;

pub trait OrderPort {
    fn submit(&mut self, orders: &[Order]) -> Result<(), SiegfriedError>;
}
