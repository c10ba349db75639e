//! Snowflake ids.
//!
//! A snowflake packs 42 bits of milliseconds since an [`Epoch`], a 5 bit worker id,
//! a 5 bit process id and a 12 bit increment into one `u64`. Ids handed out by a
//! single [`SnowflakeGenerator`] are strictly increasing, so comparing two ids
//! compares their creation order.
//!
//! See <https://discord.com/developers/docs/reference#snowflakes>

use derive_where::derive_where;
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use std::{
    fmt::{Debug, Display, Formatter},
    marker::PhantomData,
};
use thiserror::Error;
use time::{Duration, UtcDateTime};

pub const TIMESTAMP_OFFSET: u32 = 22;
pub const TIMESTAMP_LENGTH: u32 = 42;
pub const WORKER_ID_OFFSET: u32 = 17;
pub const WORKER_ID_LENGTH: u32 = 5;
pub const PROCESS_ID_OFFSET: u32 = 12;
pub const PROCESS_ID_LENGTH: u32 = 5;
pub const INCREMENT_OFFSET: u32 = 0;
pub const INCREMENT_LENGTH: u32 = 12;

pub const TIMESTAMP_MAX: u64 = mask(TIMESTAMP_LENGTH);
pub const INCREMENT_MAX: u16 = 0x0FFF;

const fn mask(length: u32) -> u64 {
    (1 << length) - 1
}

pub trait Epoch {
    const EPOCH_TIME: UtcDateTime;
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
pub enum SnowflakeTimestampError {
    #[error("Specified time was before the snowflake epoch.")]
    TimeBeforeEpoch,
    #[error("Resulting timestamp uses too many bits.")]
    TimestampTooLarge,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Snowflake part was out of range: {0}")]
pub struct SnowflakePartOutOfRangeError(u8);

macro_rules! snowflake_node_id {
    ($name:ident, $offset:ident, $length:ident) => {
        #[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
        #[serde(transparent)]
        pub struct $name(u8);

        impl $name {
            #[must_use]
            pub fn new(id: u8) -> Option<Self> {
                (u64::from(id) <= mask($length)).then_some(Self(id))
            }

            #[must_use]
            pub fn new_unchecked(id: u8) -> Self {
                Self::new(id).expect(concat!(stringify!($name), " out of range."))
            }

            #[must_use]
            pub fn get(self) -> u8 {
                self.0
            }

            #[allow(clippy::cast_possible_truncation)]
            fn from_snowflake(snowflake: u64) -> Self {
                Self(((snowflake >> $offset) & mask($length)) as u8)
            }
        }

        impl TryFrom<u8> for $name {
            type Error = SnowflakePartOutOfRangeError;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                Self::new(value).ok_or(SnowflakePartOutOfRangeError(value))
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let inner = u8::deserialize(deserializer)?;
                Self::new(inner).ok_or_else(|| {
                    Error::invalid_value(Unexpected::Unsigned(inner.into()), &stringify!($name))
                })
            }
        }
    };
}

snowflake_node_id!(WorkerId, WORKER_ID_OFFSET, WORKER_ID_LENGTH);
snowflake_node_id!(ProcessId, PROCESS_ID_OFFSET, PROCESS_ID_LENGTH);

/// Milliseconds between the epoch and `time`.
pub fn millis_since_epoch<SnowflakeEpoch: Epoch>(
    time: UtcDateTime,
) -> Result<u64, SnowflakeTimestampError> {
    let millis = (time - SnowflakeEpoch::EPOCH_TIME).whole_milliseconds();
    if millis < 0 {
        return Err(SnowflakeTimestampError::TimeBeforeEpoch);
    }
    u64::try_from(millis)
        .ok()
        .filter(|millis| *millis <= TIMESTAMP_MAX)
        .ok_or(SnowflakeTimestampError::TimestampTooLarge)
}

#[derive_where(
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Debug,
    Default,
    Hash,
    Serialize,
    Deserialize
)]
#[serde(transparent)]
pub struct Snowflake<SnowflakeEpoch>(u64, #[serde(skip)] PhantomData<SnowflakeEpoch>);

impl<SnowflakeEpoch> Snowflake<SnowflakeEpoch> {
    #[must_use]
    pub fn new(inner: u64) -> Self {
        Self(inner, PhantomData)
    }

    /// Returns `None` if any part does not fit into its bit range.
    #[must_use]
    pub fn from_parts(
        timestamp_millis: u64,
        worker_id: WorkerId,
        process_id: ProcessId,
        increment: u16,
    ) -> Option<Self> {
        if timestamp_millis > TIMESTAMP_MAX || increment > INCREMENT_MAX {
            return None;
        }

        let snowflake = timestamp_millis << TIMESTAMP_OFFSET
            | u64::from(worker_id.get()) << WORKER_ID_OFFSET
            | u64::from(process_id.get()) << PROCESS_ID_OFFSET
            | u64::from(increment) << INCREMENT_OFFSET;

        Some(Self::new(snowflake))
    }

    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }

    #[must_use]
    pub fn timestamp_millis(self) -> u64 {
        (self.0 >> TIMESTAMP_OFFSET) & TIMESTAMP_MAX
    }

    #[must_use]
    pub fn worker_id(self) -> WorkerId {
        WorkerId::from_snowflake(self.0)
    }

    #[must_use]
    pub fn process_id(self) -> ProcessId {
        ProcessId::from_snowflake(self.0)
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn increment(self) -> u16 {
        ((self.0 >> INCREMENT_OFFSET) & mask(INCREMENT_LENGTH)) as u16
    }

    #[must_use]
    pub fn created_at(self) -> UtcDateTime
    where
        SnowflakeEpoch: Epoch,
    {
        SnowflakeEpoch::EPOCH_TIME + Duration::milliseconds(self.timestamp_millis().cast_signed())
    }
}

impl<SnowflakeEpoch> Display for Snowflake<SnowflakeEpoch> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<SnowflakeEpoch> From<u64> for Snowflake<SnowflakeEpoch> {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

impl<SnowflakeEpoch> From<Snowflake<SnowflakeEpoch>> for u64 {
    fn from(value: Snowflake<SnowflakeEpoch>) -> Self {
        value.get()
    }
}

#[derive_where(Copy, Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct SnowflakeGenerator<SnowflakeEpoch> {
    worker_id: WorkerId,
    process_id: ProcessId,
    last: Option<(u64, u16)>,
    phantom_data: PhantomData<SnowflakeEpoch>,
}

impl<SnowflakeEpoch> SnowflakeGenerator<SnowflakeEpoch> {
    #[must_use]
    pub fn new(worker_id: WorkerId, process_id: ProcessId) -> Self {
        Self {
            worker_id,
            process_id,
            last: None,
            phantom_data: PhantomData,
        }
    }

    #[must_use]
    pub fn worker_id(self) -> WorkerId {
        self.worker_id
    }

    #[must_use]
    pub fn process_id(self) -> ProcessId {
        self.process_id
    }

    /// A clock running backwards, or more than [`INCREMENT_MAX`] ids in one millisecond,
    /// borrows from the following milliseconds so the output stays strictly increasing.
    pub fn generate_at(
        &mut self,
        time: UtcDateTime,
    ) -> Result<Snowflake<SnowflakeEpoch>, SnowflakeTimestampError>
    where
        SnowflakeEpoch: Epoch,
    {
        let millis = millis_since_epoch::<SnowflakeEpoch>(time)?;

        let (millis, increment) = match self.last {
            Some((last_millis, last_increment)) if millis <= last_millis => {
                if last_increment >= INCREMENT_MAX {
                    (last_millis + 1, 0)
                } else {
                    (last_millis, last_increment + 1)
                }
            }
            _ => (millis, 0),
        };

        let snowflake = Snowflake::from_parts(millis, self.worker_id, self.process_id, increment)
            .ok_or(SnowflakeTimestampError::TimestampTooLarge)?;
        self.last = Some((millis, increment));

        Ok(snowflake)
    }

    pub fn generate(&mut self) -> Result<Snowflake<SnowflakeEpoch>, SnowflakeTimestampError>
    where
        SnowflakeEpoch: Epoch,
    {
        self.generate_at(UtcDateTime::now())
    }
}

#[cfg(test)]
mod tests {
    use crate::snowflake::{
        Epoch, INCREMENT_MAX, ProcessId, Snowflake, SnowflakeGenerator, SnowflakeTimestampError,
        TIMESTAMP_MAX, WorkerId, millis_since_epoch,
    };
    use time::{Duration, UtcDateTime, macros::utc_datetime};

    struct MillennialEpoch;
    impl Epoch for MillennialEpoch {
        const EPOCH_TIME: UtcDateTime = utc_datetime!(2000-1-1 00:00);
    }

    #[test]
    fn node_id_ranges() {
        for legal_id in [0, 0xD, 0x1F] {
            assert!(WorkerId::new(legal_id).is_some());
            assert!(ProcessId::new(legal_id).is_some());
        }
        for illegal_id in [0x20, 0xF0, u8::MAX] {
            assert!(WorkerId::new(illegal_id).is_none());
            assert!(ProcessId::new(illegal_id).is_none());
        }
    }

    #[test]
    fn epoch_millis() {
        assert_eq!(
            millis_since_epoch::<MillennialEpoch>(MillennialEpoch::EPOCH_TIME),
            Ok(0)
        );
        assert_eq!(
            millis_since_epoch::<MillennialEpoch>(
                MillennialEpoch::EPOCH_TIME + Duration::milliseconds(0x03FF_FFFF_FFFF)
            ),
            Ok(TIMESTAMP_MAX)
        );
        assert_eq!(
            millis_since_epoch::<MillennialEpoch>(
                MillennialEpoch::EPOCH_TIME - Duration::milliseconds(1)
            ),
            Err(SnowflakeTimestampError::TimeBeforeEpoch)
        );
        assert_eq!(
            millis_since_epoch::<MillennialEpoch>(
                MillennialEpoch::EPOCH_TIME + Duration::milliseconds(0x0400_0000_0000)
            ),
            Err(SnowflakeTimestampError::TimestampTooLarge)
        );
    }

    #[test]
    fn snowflake_from_into_parts() {
        let time = utc_datetime!(2025-10-24 10:30);
        let millis = millis_since_epoch::<MillennialEpoch>(time).unwrap();
        let worker_id = WorkerId::new_unchecked(0b10101);
        let process_id = ProcessId::new_unchecked(0b10001);

        let snowflake =
            Snowflake::<MillennialEpoch>::from_parts(millis, worker_id, process_id, 100).unwrap();

        assert_eq!(snowflake.get(), 3_416_751_341_570_822_244);
        assert_eq!(snowflake.timestamp_millis(), millis);
        assert_eq!(snowflake.worker_id(), worker_id);
        assert_eq!(snowflake.process_id(), process_id);
        assert_eq!(snowflake.increment(), 100);
        assert_eq!(snowflake.created_at(), time);

        assert!(
            Snowflake::<MillennialEpoch>::from_parts(millis, worker_id, process_id, 0x1000)
                .is_none()
        );
    }

    #[test]
    fn generator_same_millisecond() {
        let worker_id = WorkerId::new_unchecked(10);
        let process_id = ProcessId::new_unchecked(0);
        let time = utc_datetime!(2025-10-24 10:55);

        let mut generator = SnowflakeGenerator::<MillennialEpoch>::new(worker_id, process_id);

        let first = generator.generate_at(time).unwrap();
        let second = generator.generate_at(time).unwrap();

        assert_eq!(first.increment(), 0);
        assert_eq!(second.increment(), 1);
        assert_eq!(first.timestamp_millis(), second.timestamp_millis());
        assert_eq!(second.worker_id(), worker_id);
        assert!(first < second);
    }

    #[test]
    fn generator_stays_increasing() {
        let mut generator = SnowflakeGenerator::<MillennialEpoch>::new(
            WorkerId::new_unchecked(1),
            ProcessId::new_unchecked(2),
        );
        let time = utc_datetime!(2025-10-24 10:55);

        let mut previous = generator.generate_at(time).unwrap();
        for _ in 0..=INCREMENT_MAX {
            let next = generator.generate_at(time).unwrap();
            assert!(previous < next);
            previous = next;
        }
        assert_eq!(
            previous.timestamp_millis(),
            millis_since_epoch::<MillennialEpoch>(time).unwrap() + 1
        );

        let earlier = generator
            .generate_at(time - Duration::seconds(10))
            .unwrap();
        assert!(previous < earlier);

        let later = generator.generate_at(time + Duration::seconds(1)).unwrap();
        assert_eq!(later.increment(), 0);
        assert!(earlier < later);
    }
}
