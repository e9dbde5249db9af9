//! Async poll loop
//!
//! Hosted applications rarely have a superloop. [`run`] drives a [`Slave`] on
//! a tokio interval until a shutdown future resolves.
//!
//! ```rust,no_run
//! # #[cfg(feature = "rtu")]
//! # async fn serve(units: modbus_rtu_slave::UnitRegistry) -> modbus_rtu_slave::ModbusResult<()> {
//! use std::time::Duration;
//! use modbus_rtu_slave::{driver, Slave, SlaveConfig, SerialTransport, StdClock};
//!
//! let config = SlaveConfig::new().with_baud_rate(9600);
//! let port = SerialTransport::open("/dev/ttyUSB0", config.baud_rate)?;
//! let mut slave = Slave::new(config, units, port, StdClock::new())?;
//!
//! let stats = driver::run(&mut slave, Duration::from_micros(200), tokio::signal::ctrl_c()).await?;
//! println!("served {} requests", stats.requests_dispatched);
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::error::{ModbusError, ModbusResult};
use crate::slave::{Slave, SlaveStats};
use crate::transport::{Clock, Transport, TxEnable};

/// Poll `slave` every `interval` until `shutdown` completes
///
/// Returns the final counters. A transport failure stops the loop and is
/// returned as the error.
pub async fn run<T, C, P, F>(
    slave: &mut Slave<T, C, P>,
    interval: Duration,
    shutdown: F,
) -> ModbusResult<SlaveStats>
where
    T: Transport,
    C: Clock,
    P: TxEnable,
    F: Future,
{
    if interval.is_zero() {
        return Err(ModbusError::config("poll interval must be non-zero"));
    }

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    info!(
        units = slave.units().len(),
        baud_rate = slave.config().baud_rate,
        interval_us = interval.as_micros() as u64,
        "Modbus RTU slave started"
    );

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                let stats = slave.stats();
                info!(
                    requests = stats.requests_dispatched,
                    exceptions = stats.exceptions_sent,
                    dropped = stats.frames_dropped,
                    "Modbus RTU slave stopped"
                );
                return Ok(stats);
            }
            _ = ticker.tick() => {
                if let Err(e) = slave.poll() {
                    warn!(error = %e, "Transport failure, stopping slave");
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SlaveConfig;
    use crate::crc::{append_crc, verify_crc};
    use crate::function::Category;
    use crate::testing::MemoryTransport;
    use crate::transport::StdClock;
    use crate::unit::{Unit, UnitRegistry};
    use tokio::sync::oneshot;

    fn units() -> UnitRegistry {
        UnitRegistry::new()
            .with_unit(
                Unit::new(7)
                    .unwrap()
                    .with_handler(Category::ReadHoldingRegisters, |req| {
                        req.write_register(0, 0xBEEF)
                    }),
            )
            .unwrap()
    }

    #[tokio::test]
    async fn test_driver_answers_until_shutdown() {
        let wire = MemoryTransport::new();
        let mut slave =
            Slave::new(SlaveConfig::default(), units(), wire.clone(), StdClock::new()).unwrap();
        let (stop, stopped) = oneshot::channel::<()>();

        let master = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let mut request = vec![7, 0x03, 0x00, 0x00, 0x00, 0x01];
            append_crc(&mut request);
            wire.push_rx(&request);
            tokio::time::sleep(Duration::from_millis(30)).await;
            let _ = stop.send(());
        };

        let (stats, ()) = tokio::join!(
            run(&mut slave, Duration::from_micros(200), stopped),
            master
        );
        let stats = stats.unwrap();

        let response = wire.take_tx();
        assert_eq!(&response[..5], &[7, 0x03, 0x02, 0xBE, 0xEF]);
        assert!(verify_crc(&response));
        assert_eq!(stats.requests_dispatched, 1);
        assert_eq!(stats.responses_sent, 1);
    }

    #[tokio::test]
    async fn test_driver_stops_on_transport_failure() {
        let wire = MemoryTransport::new();
        let mut slave =
            Slave::new(SlaveConfig::default(), units(), wire.clone(), StdClock::new()).unwrap();
        wire.set_failing(true);

        let result = run(
            &mut slave,
            Duration::from_millis(1),
            std::future::pending::<()>(),
        )
        .await;
        assert!(result.unwrap_err().is_transport_error());
    }

    #[test]
    fn test_driver_rejects_zero_interval() {
        let wire = MemoryTransport::new();
        let mut slave =
            Slave::new(SlaveConfig::default(), units(), wire, StdClock::new()).unwrap();
        let result = tokio_test::block_on(run(&mut slave, Duration::ZERO, async {}));
        assert!(matches!(result, Err(ModbusError::Config { .. })));
    }
}
