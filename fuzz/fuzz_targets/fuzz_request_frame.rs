//! Feed arbitrary line traffic to a slave and check it never panics and
//! keeps its counters consistent.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use modbus_rtu_slave::crc::append_crc;
use modbus_rtu_slave::testing::{ManualClock, MemoryTransport};
use modbus_rtu_slave::{Category, Slave, SlaveConfig, Unit, UnitRegistry};

#[derive(Debug, Arbitrary)]
struct Chunk {
    bytes: Vec<u8>,
    /// Microseconds of line silence after the chunk
    gap: u16,
    /// Append a valid CRC so the chunk reaches the handlers
    seal: bool,
    /// Free transmit FIFO space drained after the chunk
    drain: bool,
}

#[derive(Debug, Arbitrary)]
struct Session {
    capacity: u8,
    tx_fifo: u8,
    chunks: Vec<Chunk>,
}

fn units() -> UnitRegistry {
    let unit = Unit::new(1)
        .unwrap()
        .with_handler(Category::ReadCoils, |req| {
            for offset in 0..req.quantity() {
                req.write_coil(offset, offset % 3 == 0)?;
            }
            Ok(())
        })
        .with_handler(Category::ReadHoldingRegisters, |req| {
            for offset in 0..req.quantity() {
                req.write_register(offset, offset)?;
            }
            Ok(())
        })
        .with_handler(Category::WriteHoldingRegisters, |req| {
            for offset in 0..req.quantity() {
                let _ = req.read_register(offset);
            }
            Ok(())
        })
        .with_handler(Category::WriteCoils, |req| {
            for offset in 0..req.quantity() {
                let _ = req.read_coil(offset);
            }
            Ok(())
        })
        .with_handler(Category::ReadExceptionStatus, |req| {
            req.write_exception_status(7, true)
        });
    UnitRegistry::new().with_unit(unit).unwrap()
}

fuzz_target!(|session: Session| {
    let capacity = usize::from(session.capacity).max(4);
    let wire = MemoryTransport::with_tx_capacity(usize::from(session.tx_fifo));
    let clock = ManualClock::new();
    let config = SlaveConfig::new().with_buffer_capacity(capacity);
    let mut slave = match Slave::new(config, units(), wire.clone(), clock.clone()) {
        Ok(slave) => slave,
        Err(_) => return,
    };
    clock.advance(10_000);

    for chunk in session.chunks.iter().take(64) {
        let mut bytes = chunk.bytes.clone();
        if chunk.seal {
            append_crc(&mut bytes);
        }
        wire.push_rx(&bytes);
        for _ in 0..4 {
            slave.poll().unwrap();
            if chunk.drain {
                wire.drain_tx();
            }
            clock.advance(u64::from(chunk.gap));
        }
    }

    // Let the line go quiet and any response finish
    for _ in 0..4096 {
        wire.drain_tx();
        clock.advance(1_000);
        slave.poll().unwrap();
    }

    let stats = slave.stats();
    assert!(stats.bytes_sent >= 5 * stats.responses_sent);
    assert!(stats.bytes_sent as usize >= wire.take_tx().len());
});
