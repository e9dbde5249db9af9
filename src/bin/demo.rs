//! Modbus RTU Slave Demo
//!
//! Runs a slave hosting two units against a simulated master over an
//! in-memory line:
//! - Reading holding registers and coils
//! - Writing registers and coils, then reading them back
//! - Exception responses and broadcast writes
//!
//! Usage: cargo run --bin demo

use std::sync::{Arc, Mutex};
use std::time::Duration;

use modbus_rtu_slave::crc::{append_crc, verify_crc};
use modbus_rtu_slave::testing::MemoryTransport;
use modbus_rtu_slave::{
    driver, Category, ExceptionCode, Slave, SlaveConfig, StdClock, Unit, UnitRegistry,
};
use tokio::sync::oneshot;
use tokio::time::sleep;

const REGISTER_COUNT: usize = 32;
const COIL_COUNT: usize = 16;

#[derive(Debug, Default)]
struct ProcessImage {
    registers: [u16; REGISTER_COUNT],
    coils: [bool; COIL_COUNT],
}

/// Unit exposing a shared process image
fn process_unit(address: u8, image: Arc<Mutex<ProcessImage>>) -> Result<Unit, Box<dyn std::error::Error>> {
    let read_regs = image.clone();
    let write_regs = image.clone();
    let read_coils = image.clone();
    let write_coils = image;

    let unit = Unit::new(address)?
        .with_handler(Category::ReadHoldingRegisters, move |req| {
            let image = read_regs.lock().map_err(|_| ExceptionCode::ServerDeviceFailure)?;
            for offset in 0..req.quantity() {
                let address = usize::from(req.start_address() + offset);
                let value = *image
                    .registers
                    .get(address)
                    .ok_or(ExceptionCode::IllegalDataAddress)?;
                req.write_register(offset, value)?;
            }
            Ok(())
        })
        .with_handler(Category::WriteHoldingRegisters, move |req| {
            let mut image = write_regs.lock().map_err(|_| ExceptionCode::ServerDeviceFailure)?;
            for offset in 0..req.quantity() {
                let address = usize::from(req.start_address() + offset);
                let value = req.read_register(offset).ok_or(ExceptionCode::IllegalDataValue)?;
                let slot = image
                    .registers
                    .get_mut(address)
                    .ok_or(ExceptionCode::IllegalDataAddress)?;
                *slot = value;
            }
            Ok(())
        })
        .with_handler(Category::ReadCoils, move |req| {
            let image = read_coils.lock().map_err(|_| ExceptionCode::ServerDeviceFailure)?;
            for offset in 0..req.quantity() {
                let address = usize::from(req.start_address() + offset);
                let state = *image
                    .coils
                    .get(address)
                    .ok_or(ExceptionCode::IllegalDataAddress)?;
                req.write_coil(offset, state)?;
            }
            Ok(())
        })
        .with_handler(Category::WriteCoils, move |req| {
            let mut image = write_coils.lock().map_err(|_| ExceptionCode::ServerDeviceFailure)?;
            for offset in 0..req.quantity() {
                let address = usize::from(req.start_address() + offset);
                let state = req.read_coil(offset).ok_or(ExceptionCode::IllegalDataValue)?;
                let slot = image
                    .coils
                    .get_mut(address)
                    .ok_or(ExceptionCode::IllegalDataAddress)?;
                *slot = state;
            }
            Ok(())
        })
        .with_handler(Category::ReadExceptionStatus, |req| {
            req.write_exception_status(0, true)
        });

    Ok(unit)
}

/// Send one request and return whatever came back
async fn transact(wire: &MemoryTransport, pdu: &[u8]) -> Vec<u8> {
    let mut frame = pdu.to_vec();
    append_crc(&mut frame);
    wire.take_tx();
    wire.push_rx(&frame);
    sleep(Duration::from_millis(15)).await;
    wire.take_tx()
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

async fn show(wire: &MemoryTransport, label: &str, pdu: &[u8]) {
    let response = transact(wire, pdu).await;
    println!("  {}", label);
    println!("    → {}", hex(pdu));
    if response.is_empty() {
        println!("    ← (no response)");
    } else {
        let crc = if verify_crc(&response) { "CRC ok" } else { "CRC BAD" };
        println!("    ← {} [{}]", hex(&response), crc);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🚀 {} Demo", modbus_rtu_slave::info());
    println!("=============================================");

    let image_a = Arc::new(Mutex::new(ProcessImage::default()));
    let image_b = Arc::new(Mutex::new(ProcessImage::default()));
    if let Ok(mut image) = image_a.lock() {
        image.registers[..4].copy_from_slice(&[0x1234, 0x5678, 230, 50]);
        image.coils[..3].copy_from_slice(&[true, false, true]);
    }

    let units = UnitRegistry::new()
        .with_unit(process_unit(0x11, image_a.clone())?)?
        .with_unit(process_unit(0x12, image_b.clone())?)?;

    let config = SlaveConfig::new().with_baud_rate(19_200);
    let wire = MemoryTransport::new();
    let mut slave = Slave::new(config, units, wire.clone(), StdClock::new())?;
    println!(
        "  Units: 0x11, 0x12 | {} baud | 1.5T = {} µs\n",
        config.baud_rate,
        3 * config.half_char_time_us()
    );

    let (stop, stopped) = oneshot::channel::<()>();

    let master = async {
        sleep(Duration::from_millis(10)).await;

        // =====================================================================
        // Part 1: Reads
        // =====================================================================
        println!("📖 Part 1: Reads");
        println!("----------------");
        show(&wire, "FC03 unit 0x11, 4 registers from 0", &[0x11, 0x03, 0x00, 0x00, 0x00, 0x04]).await;
        show(&wire, "FC01 unit 0x11, 3 coils from 0", &[0x11, 0x01, 0x00, 0x00, 0x00, 0x03]).await;
        show(&wire, "FC07 unit 0x11, exception status", &[0x11, 0x07]).await;

        // =====================================================================
        // Part 2: Writes
        // =====================================================================
        println!("\n✍️  Part 2: Writes");
        println!("------------------");
        show(&wire, "FC06 unit 0x12, register 5 = 0x00FF", &[0x12, 0x06, 0x00, 0x05, 0x00, 0xFF]).await;
        show(
            &wire,
            "FC10 unit 0x12, registers 6..8 = 1, 2",
            &[0x12, 0x10, 0x00, 0x06, 0x00, 0x02, 0x04, 0x00, 0x01, 0x00, 0x02],
        )
        .await;
        show(&wire, "FC05 unit 0x12, coil 3 ON", &[0x12, 0x05, 0x00, 0x03, 0xFF, 0x00]).await;
        show(&wire, "FC03 unit 0x12, read back 5..8", &[0x12, 0x03, 0x00, 0x05, 0x00, 0x03]).await;

        // =====================================================================
        // Part 3: Exceptions and broadcast
        // =====================================================================
        println!("\n⚠️  Part 3: Exceptions and broadcast");
        println!("-----------------------------------");
        show(&wire, "FC03 beyond the register map", &[0x11, 0x03, 0x00, 0x1F, 0x00, 0x02]).await;
        show(&wire, "FC04 not implemented", &[0x11, 0x04, 0x00, 0x00, 0x00, 0x01]).await;
        show(&wire, "FC2B unsupported function", &[0x11, 0x2B, 0x0E, 0x01]).await;
        show(&wire, "FC06 broadcast, register 0 = 7", &[0x00, 0x06, 0x00, 0x00, 0x00, 0x07]).await;
        show(&wire, "FC03 unit 0x44 (not hosted)", &[0x44, 0x03, 0x00, 0x00, 0x00, 0x01]).await;

        let _ = stop.send(());
    };

    let (stats, ()) = tokio::join!(driver::run(&mut slave, Duration::from_micros(200), stopped), master);
    let stats = stats?;

    if let (Ok(a), Ok(b)) = (image_a.lock(), image_b.lock()) {
        println!("\n📦 Process images after broadcast");
        println!("  0x11 registers[0..4]: {:04X?}", &a.registers[..4]);
        println!("  0x12 registers[0..9]: {:04X?}", &b.registers[..9]);
        println!("  0x12 coils[0..4]:     {:?}", &b.coils[..4]);
    }

    println!("\n📈 Statistics");
    println!("  Bytes received:      {}", stats.bytes_received);
    println!("  Bytes sent:          {}", stats.bytes_sent);
    println!("  Requests dispatched: {}", stats.requests_dispatched);
    println!("  Exceptions sent:     {}", stats.exceptions_sent);
    println!("  Broadcasts:          {}", stats.broadcasts);
    println!("  Frames dropped:      {}", stats.frames_dropped);

    println!("\n✅ Demo complete");
    Ok(())
}
