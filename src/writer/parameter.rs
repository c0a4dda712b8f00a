//! Registered and non-registered parameter changes
//!
//! Each change selects the parameter, writes the data and then deselects the
//! parameter again (null parameter 127/127), so later data entry messages
//! can't change it by accident.

use super::{cc, check_channel, Writer};
use crate::error::Result;
use crate::midi::MessageSink;

#[derive(Debug, Clone, Copy)]
enum Kind {
    Registered,
    NonRegistered,
}

impl Kind {
    fn select(self) -> (u8, u8) {
        match self {
            Kind::Registered => (cc::RPN_MSB, cc::RPN_LSB),
            Kind::NonRegistered => (cc::NRPN_MSB, cc::NRPN_LSB),
        }
    }
}

impl<S: MessageSink> Writer<S> {
    /// Sets a registered parameter (e.g. 0/0 for pitch bend range)
    pub fn rpn(
        &mut self,
        channel: u8,
        param_msb: u8,
        param_lsb: u8,
        value_msb: u8,
        value_lsb: u8,
    ) -> Result<()> {
        self.parameter(
            Kind::Registered,
            channel,
            (param_msb, param_lsb),
            &[(cc::DATA_ENTRY_MSB, value_msb), (cc::DATA_ENTRY_LSB, value_lsb)],
        )
    }

    pub fn rpn_increment(&mut self, channel: u8, param_msb: u8, param_lsb: u8) -> Result<()> {
        self.parameter(
            Kind::Registered,
            channel,
            (param_msb, param_lsb),
            &[(cc::DATA_INCREMENT, 0)],
        )
    }

    pub fn rpn_decrement(&mut self, channel: u8, param_msb: u8, param_lsb: u8) -> Result<()> {
        self.parameter(
            Kind::Registered,
            channel,
            (param_msb, param_lsb),
            &[(cc::DATA_DECREMENT, 0)],
        )
    }

    pub fn nrpn(
        &mut self,
        channel: u8,
        param_msb: u8,
        param_lsb: u8,
        value_msb: u8,
        value_lsb: u8,
    ) -> Result<()> {
        self.parameter(
            Kind::NonRegistered,
            channel,
            (param_msb, param_lsb),
            &[(cc::DATA_ENTRY_MSB, value_msb), (cc::DATA_ENTRY_LSB, value_lsb)],
        )
    }

    pub fn nrpn_increment(&mut self, channel: u8, param_msb: u8, param_lsb: u8) -> Result<()> {
        self.parameter(
            Kind::NonRegistered,
            channel,
            (param_msb, param_lsb),
            &[(cc::DATA_INCREMENT, 0)],
        )
    }

    pub fn nrpn_decrement(&mut self, channel: u8, param_msb: u8, param_lsb: u8) -> Result<()> {
        self.parameter(
            Kind::NonRegistered,
            channel,
            (param_msb, param_lsb),
            &[(cc::DATA_DECREMENT, 0)],
        )
    }

    /// Deselects any registered parameter on `channel`
    pub fn rpn_reset(&mut self, channel: u8) -> Result<()> {
        self.parameter_reset(Kind::Registered, channel)
    }

    /// Deselects any non-registered parameter on `channel`
    pub fn nrpn_reset(&mut self, channel: u8) -> Result<()> {
        self.parameter_reset(Kind::NonRegistered, channel)
    }

    /// Stops at the first failing write, but always attempts the reset.
    /// A failing reset takes precedence over the earlier error.
    fn parameter(
        &mut self,
        kind: Kind,
        channel: u8,
        (param_msb, param_lsb): (u8, u8),
        data: &[(u8, u8)],
    ) -> Result<()> {
        check_channel(channel)?;
        let (select_msb, select_lsb) = kind.select();

        let result = [(select_msb, param_msb), (select_lsb, param_lsb)]
            .iter()
            .chain(data)
            .try_for_each(|&(controller, value)| self.control_change(channel, controller, value));

        match self.parameter_reset(kind, channel) {
            Err(e) => Err(e),
            Ok(()) => result,
        }
    }

    fn parameter_reset(&mut self, kind: Kind, channel: u8) -> Result<()> {
        let (select_msb, select_lsb) = kind.select();
        self.control_change(channel, select_msb, 127)?;
        self.control_change(channel, select_lsb, 127)
    }
}
