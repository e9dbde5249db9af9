//! Units and the unit registry
//!
//! A device answers for one or more Modbus units. Each [`Unit`] owns an
//! address and a table of handlers, one slot per [`Category`]. An empty slot
//! means the unit does not implement that category and the request is answered
//! with Illegal Function.
//!
//! | Address       | Routed to                                  |
//! |---------------|--------------------------------------------|
//! | 0 (broadcast) | every unit, results ignored, never answered |
//! | 1-247         | the unit with that address, if configured  |
//! | other         | nobody, the frame is ignored               |

use std::fmt;

use tracing::warn;

use crate::constants::{BROADCAST_ADDRESS, UNIT_ADDRESS_MAX, UNIT_ADDRESS_MIN};
use crate::error::{ModbusError, ModbusResult};
use crate::exchange::Exchange;
use crate::function::{Category, ExceptionCode, HandlerResult};

/// Request handler invoked with the request parameters and response accessors
pub type Handler = Box<dyn FnMut(&mut Exchange<'_>) -> HandlerResult + Send>;

/// Check that `address` can be assigned to a unit
pub fn validate_unit_address(address: u8) -> ModbusResult<()> {
    if (UNIT_ADDRESS_MIN..=UNIT_ADDRESS_MAX).contains(&address) {
        Ok(())
    } else {
        Err(ModbusError::InvalidUnitAddress { address })
    }
}

/// One addressable Modbus unit
pub struct Unit {
    address: u8,
    handlers: [Option<Handler>; Category::COUNT],
}

impl Unit {
    /// Create a unit with no handlers
    ///
    /// # Errors
    ///
    /// Returns [`ModbusError::InvalidUnitAddress`] unless `address` is 1-247.
    pub fn new(address: u8) -> ModbusResult<Self> {
        validate_unit_address(address)?;
        Ok(Self {
            address,
            handlers: Default::default(),
        })
    }

    #[inline]
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Change the unit address
    pub fn set_address(&mut self, address: u8) -> ModbusResult<()> {
        validate_unit_address(address)?;
        self.address = address;
        Ok(())
    }

    /// Install or replace the handler for `category`
    pub fn set_handler<F>(&mut self, category: Category, handler: F)
    where
        F: FnMut(&mut Exchange<'_>) -> HandlerResult + Send + 'static,
    {
        self.handlers[category.index()] = Some(Box::new(handler));
    }

    /// Builder form of [`Unit::set_handler`]
    pub fn with_handler<F>(mut self, category: Category, handler: F) -> Self
    where
        F: FnMut(&mut Exchange<'_>) -> HandlerResult + Send + 'static,
    {
        self.set_handler(category, handler);
        self
    }

    /// Remove the handler for `category`, returning it
    pub fn clear_handler(&mut self, category: Category) -> Option<Handler> {
        self.handlers[category.index()].take()
    }

    pub fn has_handler(&self, category: Category) -> bool {
        self.handlers[category.index()].is_some()
    }

    /// Run the handler for `category`, Illegal Function if there is none
    pub fn handle(&mut self, category: Category, exchange: &mut Exchange<'_>) -> HandlerResult {
        match self.handlers[category.index()].as_mut() {
            Some(handler) => handler(exchange),
            None => Err(ExceptionCode::IllegalFunction),
        }
    }
}

impl fmt::Debug for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let implemented: Vec<Category> = Category::ALL
            .iter()
            .copied()
            .filter(|c| self.has_handler(*c))
            .collect();
        f.debug_struct("Unit")
            .field("address", &self.address)
            .field("handlers", &implemented)
            .finish()
    }
}

/// The units hosted by one slave
#[derive(Debug, Default)]
pub struct UnitRegistry {
    units: Vec<Unit>,
}

impl UnitRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a unit, rejecting duplicate addresses
    pub fn add(&mut self, unit: Unit) -> ModbusResult<()> {
        if self.contains(unit.address()) {
            return Err(ModbusError::DuplicateUnit {
                address: unit.address(),
            });
        }
        self.units.push(unit);
        Ok(())
    }

    /// Builder form of [`UnitRegistry::add`]
    pub fn with_unit(mut self, unit: Unit) -> ModbusResult<Self> {
        self.add(unit)?;
        Ok(self)
    }

    /// Remove and return the unit with `address`
    pub fn remove(&mut self, address: u8) -> Option<Unit> {
        let index = self.units.iter().position(|u| u.address() == address)?;
        Some(self.units.remove(index))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn contains(&self, address: u8) -> bool {
        self.units.iter().any(|u| u.address() == address)
    }

    pub fn unit(&self, address: u8) -> Option<&Unit> {
        self.units.iter().find(|u| u.address() == address)
    }

    pub fn unit_mut(&mut self, address: u8) -> Option<&mut Unit> {
        self.units.iter_mut().find(|u| u.address() == address)
    }

    /// Units in the order they were added
    pub fn iter(&self) -> impl Iterator<Item = &Unit> {
        self.units.iter()
    }

    /// Move the unit at `old` to `new`
    pub fn readdress(&mut self, old: u8, new: u8) -> ModbusResult<()> {
        validate_unit_address(new)?;
        if old != new && self.contains(new) {
            return Err(ModbusError::DuplicateUnit { address: new });
        }
        let unit = self
            .unit_mut(old)
            .ok_or(ModbusError::UnknownUnit { address: old })?;
        unit.set_address(new)
    }

    /// Whether a frame sent to `address` concerns this device
    pub fn is_relevant(&self, address: u8) -> bool {
        address == BROADCAST_ADDRESS || self.contains(address)
    }

    /// Route a request to the handler(s) for `address`
    ///
    /// A broadcast runs every unit's handler for the category and always
    /// succeeds.
    pub fn dispatch(
        &mut self,
        address: u8,
        category: Category,
        exchange: &mut Exchange<'_>,
    ) -> HandlerResult {
        if address == BROADCAST_ADDRESS {
            for unit in self.units.iter_mut() {
                let _ = unit.handle(category, exchange);
            }
            return Ok(());
        }

        match self.unit_mut(address) {
            Some(unit) => unit.handle(category, exchange),
            None => Err(ExceptionCode::IllegalFunction),
        }
    }
}

impl UnitRegistry {
    /// Collect units, failing on the first duplicate address
    pub fn try_from_iter<I: IntoIterator<Item = Unit>>(iter: I) -> ModbusResult<Self> {
        let mut registry = Self::new();
        for unit in iter {
            registry.add(unit)?;
        }
        Ok(registry)
    }
}

impl FromIterator<Unit> for UnitRegistry {
    /// Collect units, keeping the first of any duplicate addresses
    ///
    /// Every dropped duplicate is logged. Use [`UnitRegistry::try_from_iter`]
    /// to reject them instead.
    fn from_iter<I: IntoIterator<Item = Unit>>(iter: I) -> Self {
        let mut registry = Self::new();
        for unit in iter {
            let address = unit.address();
            if let Err(e) = registry.add(unit) {
                warn!(address, error = %e, "duplicate unit dropped");
            }
        }
        registry
    }
}
