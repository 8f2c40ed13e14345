//! Temporal Tests
//!
//! Date-time and interval properties carried by a user type, checked
//! against `chrono`.

use crate::common::*;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate};
use gridwire::pof::{RawDateTime, RawDayTimeInterval};

const SHIPMENT_TYPE: i32 = 2101;

#[derive(Debug, Default, Clone, PartialEq)]
struct Shipment {
    departed: Option<RawDateTime>,
    transit: Option<RawDayTimeInterval>,
}

impl PortableObject for Shipment {
    fn read_external(&mut self, reader: &mut PofReader<'_, '_>) -> Result<()> {
        self.departed = reader.read_date_time(0)?;
        self.transit = reader.read_day_time_interval(1)?;
        Ok(())
    }

    fn write_external(&self, writer: &mut PofWriter<'_, '_>) -> Result<()> {
        if let Some(departed) = &self.departed {
            writer.write_date_time(0, departed)?;
        }
        if let Some(transit) = &self.transit {
            writer.write_day_time_interval(1, transit)?;
        }
        Ok(())
    }
}

fn context() -> SimplePofContext {
    let mut ctx = SimplePofContext::new();
    ctx.register_user_type::<Shipment>(SHIPMENT_TYPE).unwrap();
    ctx
}

fn round_trip_shipment(shipment: Shipment) -> Shipment {
    let value = PofValue::Object(PofObject::new(shipment));
    object_as::<Shipment>(&round_trip(&context(), &value))
}

#[test]
fn test_zoned_departure_survives() {
    let departed: DateTime<FixedOffset> =
        DateTime::parse_from_rfc3339("2024-02-29T13:45:10.123456789+05:30").unwrap();
    let shipment = Shipment {
        departed: Some(departed.into()),
        transit: Some(RawDayTimeInterval::new(1, 2, 30, 0, 0).unwrap()),
    };

    let back = round_trip_shipment(shipment.clone());
    assert_eq!(back, shipment);

    let raw = back.departed.unwrap();
    assert_eq!(raw.to_naive_date_time(), Some(departed.naive_local()));
    assert_eq!(raw.time().offset(), Some(*departed.offset()));
    assert_eq!(
        back.transit.unwrap().to_duration(),
        Duration::days(1) + Duration::hours(2) + Duration::minutes(30)
    );
}

#[test]
fn test_millisecond_and_utc_times() {
    let naive = NaiveDate::from_ymd_opt(1999, 12, 31)
        .unwrap()
        .and_hms_milli_opt(23, 59, 59, 250)
        .unwrap();
    let utc: DateTime<FixedOffset> = naive.and_utc().fixed_offset();
    let shipment = Shipment {
        departed: Some(utc.into()),
        transit: None,
    };

    let back = round_trip_shipment(shipment.clone());
    assert_eq!(back, shipment);
    assert_eq!(back.departed.unwrap().time().offset(), FixedOffset::east_opt(0));
    assert!(back.transit.is_none());
}

#[test]
fn test_absent_properties_stay_absent() {
    assert_eq!(round_trip_shipment(Shipment::default()), Shipment::default());
}
