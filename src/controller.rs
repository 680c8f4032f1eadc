use crate::{Button, DisplayValue, EditBuffer, IrCommand};
use embedded_hal::digital::v2::OutputPin;
use log::{debug, trace};
use private::{Context, Events, StateMachine, States};

/// Turns remote key presses into the committed display value
pub struct Controller<RST: OutputPin> {
    sm: StateMachine<Context<RST>>,
}

impl<RST> Controller<RST>
where
    RST: OutputPin,
{
    /// Takes the (active low) reset line and releases it
    pub fn new(reset_line: RST) -> Self {
        let mut sm = StateMachine::new(Context::new(reset_line));
        sm.process_event(Events::Init).ok();
        Controller { sm }
    }

    pub fn edit_buffer(&self) -> EditBuffer {
        self.entry_state().buffer
    }

    /// The value the display should show, read every loop iteration
    pub fn display_value(&self) -> DisplayValue {
        self.entry_state().shown
    }

    fn entry_state(&self) -> EntryState {
        match self.sm.state() {
            States::Entry(state_data) => *state_data,
            _ => EntryState::default(),
        }
    }

    pub fn handle_ir_command(&mut self, cmd: IrCommand) {
        // Held buttons would otherwise keep appending digits
        if cmd.repeat {
            trace!("Ignoring repeat {}", cmd);
            return;
        }

        debug!("Received {}", cmd);
        let event = match cmd.button {
            Button::Digit(d) => Events::Digit(d),
            Button::Enter => Events::Enter,
            Button::Delete => Events::Delete,
            Button::Stop => Events::Stop,
            Button::Off => Events::PowerOff,
            Button::Unknown(_) => {
                debug!("Ignoring {}", cmd);
                return;
            }
        };
        self.sm.process_event(event).ok();
    }
}

mod private {
    use crate::{Digit, DisplayValue, EditBuffer};
    use embedded_hal::digital::v2::OutputPin;
    use log::{debug, error, info, warn};
    use smlang::statemachine;

    statemachine! {
        *Reset + Init / init_action = Entry,

        Entry(EntryState) + Digit(Digit) / append_digit_action = Entry,
        Entry(EntryState) + Delete / delete_digit_action = Entry,
        Entry(EntryState) + Stop / clear_action = Entry,
        Entry(EntryState) + Enter / commit_action = Entry,
        Entry(EntryState) + PowerOff / power_off_action = Entry,
    }

    /// What is being typed and what is currently shown
    #[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
    pub struct EntryState {
        pub buffer: EditBuffer,
        pub shown: DisplayValue,
    }

    pub struct Context<RST> {
        reset_line: RST,
    }

    impl<RST> Context<RST>
    where
        RST: OutputPin,
    {
        pub fn new(reset_line: RST) -> Self {
            Context { reset_line }
        }
    }

    impl<RST> StateMachineContext for Context<RST>
    where
        RST: OutputPin,
    {
        fn init_action(&mut self) -> EntryState {
            if self.reset_line.set_high().is_err() {
                error!("Failed to release the reset line");
            }
            debug!("Initialized entry state machine");
            EntryState::default()
        }

        fn append_digit_action(
            &mut self,
            state_data: &EntryState,
            event_data: &Digit,
        ) -> EntryState {
            match state_data.buffer.with_digit(*event_data) {
                Some(buffer) => {
                    debug!("Input: {}", buffer);
                    EntryState {
                        buffer,
                        ..*state_data
                    }
                }
                None => {
                    debug!(
                        "Buffer full at {}, dropping {}",
                        state_data.buffer, event_data
                    );
                    *state_data
                }
            }
        }

        fn delete_digit_action(&mut self, state_data: &EntryState) -> EntryState {
            let buffer = state_data.buffer.without_last_digit();
            debug!("Input: {}", buffer);
            EntryState {
                buffer,
                ..*state_data
            }
        }

        fn clear_action(&mut self, state_data: &EntryState) -> EntryState {
            debug!("Input cleared");
            EntryState {
                buffer: EditBuffer::EMPTY,
                ..*state_data
            }
        }

        fn commit_action(&mut self, state_data: &EntryState) -> EntryState {
            // An over-limit buffer is dropped without touching the display.
            // The digit guard keeps the buffer below MAX, so this only
            // matters if that ever changes.
            let shown = match state_data.buffer.long_format() {
                Some(v) => {
                    info!("Showing {} (entered {})", v, state_data.buffer);
                    v
                }
                None => {
                    warn!("Discarding over-limit entry {}", state_data.buffer);
                    state_data.shown
                }
            };
            EntryState {
                buffer: EditBuffer::EMPTY,
                shown,
            }
        }

        fn power_off_action(&mut self, state_data: &EntryState) -> EntryState {
            info!("Power off");
            if self.reset_line.set_low().is_err() {
                error!("Failed to assert the reset line");
            }
            *state_data
        }
    }
}

pub use private::EntryState;

#[cfg(test)]
mod tests {
    use super::private::{Context, StateMachineContext};
    use super::*;
    use crate::logger::write_record;
    use crate::{DEFAULT_LOG_LEVEL, DEL, ENTER, HIGH_NUM, LOW_NUM, MAX, OFF, STOP};
    use core::convert::Infallible;
    use core::fmt;
    use log::{Metadata, Record};
    use proptest::prelude::*;
    use std::cell::Cell;
    use std::rc::Rc;
    use std::sync::Once;

    thread_local! {
        static LOGGED_BYTES: Cell<usize> = Cell::new(0);
    }

    /// Counts the bytes the serial logger would queue, per test thread
    struct ByteCounter;

    impl fmt::Write for ByteCounter {
        fn write_str(&mut self, s: &str) -> fmt::Result {
            LOGGED_BYTES.with(|n| n.set(n.get() + s.len()));
            Ok(())
        }
    }

    impl log::Log for ByteCounter {
        fn enabled(&self, _metadata: &Metadata) -> bool {
            true
        }

        fn log(&self, record: &Record) {
            write_record(&mut ByteCounter, record).ok();
        }

        fn flush(&self) {}
    }

    static BYTE_COUNTER: ByteCounter = ByteCounter;
    static INSTALL_LOGGER: Once = Once::new();

    /// Bytes logged at the firmware log level while running `f`
    fn logged_bytes<F: FnOnce()>(f: F) -> usize {
        INSTALL_LOGGER.call_once(|| {
            log::set_logger(&BYTE_COUNTER).unwrap();
            log::set_max_level(DEFAULT_LOG_LEVEL);
        });
        LOGGED_BYTES.with(|n| n.set(0));
        f();
        LOGGED_BYTES.with(|n| n.get())
    }

    /// Reset line fake, `None` until first driven
    #[derive(Clone, Default)]
    struct ResetPin(Rc<Cell<Option<bool>>>);

    impl OutputPin for ResetPin {
        type Error = Infallible;

        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.0.set(Some(false));
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.0.set(Some(true));
            Ok(())
        }
    }

    fn controller() -> (Controller<ResetPin>, Rc<Cell<Option<bool>>>) {
        let pin = ResetPin::default();
        let level = pin.0.clone();
        (Controller::new(pin), level)
    }

    /// Command code for a decimal digit
    fn digit_code(d: u8) -> u8 {
        if d == 0 {
            HIGH_NUM
        } else {
            LOW_NUM + d - 1
        }
    }

    fn press(c: &mut Controller<ResetPin>, code: u8) {
        c.handle_ir_command(IrCommand::new(code, false));
    }

    fn type_number(c: &mut Controller<ResetPin>, digits: &[u8]) {
        for &d in digits {
            press(c, digit_code(d));
        }
    }

    #[test]
    fn starts_empty_with_reset_released() {
        let (c, level) = controller();
        assert_eq!(c.edit_buffer(), EditBuffer::EMPTY);
        assert_eq!(c.display_value(), DisplayValue::ZERO);
        assert_eq!(level.get(), Some(true));
    }

    #[test]
    fn enter_commits_long_format() {
        let (mut c, _) = controller();
        type_number(&mut c, &[1, 2]);
        assert_eq!(c.edit_buffer().value(), 12);
        press(&mut c, ENTER);
        assert_eq!(c.display_value().value(), 12);
        assert_eq!(c.edit_buffer(), EditBuffer::EMPTY);

        type_number(&mut c, &[3, 7]);
        press(&mut c, ENTER);
        assert_eq!(c.display_value().value(), 205);
    }

    #[test]
    fn zero_code_appends_zero() {
        let (mut c, _) = controller();
        type_number(&mut c, &[1, 0, 0]);
        assert_eq!(c.edit_buffer().value(), 100);
    }

    #[test]
    fn digit_rejected_at_limit() {
        let (mut c, _) = controller();
        type_number(&mut c, &[2, 5, 5]);
        assert_eq!(c.edit_buffer().value(), 255);
        type_number(&mut c, &[1]);
        assert_eq!(c.edit_buffer().value(), 255);

        let (mut c, _) = controller();
        type_number(&mut c, &[2, 5, 6]);
        assert_eq!(c.edit_buffer().value(), 25);
    }

    #[test]
    fn delete_truncates() {
        let (mut c, _) = controller();
        type_number(&mut c, &[7]);
        press(&mut c, DEL);
        assert_eq!(c.edit_buffer(), EditBuffer::EMPTY);
        press(&mut c, DEL);
        assert_eq!(c.edit_buffer(), EditBuffer::EMPTY);

        type_number(&mut c, &[1, 2, 3]);
        press(&mut c, DEL);
        assert_eq!(c.edit_buffer().value(), 12);
    }

    #[test]
    fn stop_clears_without_commit() {
        let (mut c, _) = controller();
        type_number(&mut c, &[4, 2]);
        press(&mut c, ENTER);
        type_number(&mut c, &[9, 9]);
        press(&mut c, STOP);
        assert_eq!(c.edit_buffer(), EditBuffer::EMPTY);
        assert_eq!(c.display_value().value(), 210);
    }

    #[test]
    fn off_asserts_reset_and_keeps_state() {
        let (mut c, level) = controller();
        type_number(&mut c, &[5]);
        press(&mut c, ENTER);
        type_number(&mut c, &[6]);
        press(&mut c, OFF);
        assert_eq!(level.get(), Some(false));
        assert_eq!(c.edit_buffer().value(), 6);
        assert_eq!(c.display_value().value(), 5);
    }

    #[test]
    fn repeats_are_ignored() {
        let (mut c, level) = controller();
        type_number(&mut c, &[3]);
        for code in &[digit_code(4), ENTER, DEL, STOP, OFF] {
            c.handle_ir_command(IrCommand::new(*code, true));
        }
        assert_eq!(c.edit_buffer().value(), 3);
        assert_eq!(c.display_value(), DisplayValue::ZERO);
        assert_eq!(level.get(), Some(true));
    }

    #[test]
    fn unknown_codes_are_ignored() {
        let (mut c, _) = controller();
        type_number(&mut c, &[8]);
        press(&mut c, 200);
        press(&mut c, LOW_NUM - 1);
        assert_eq!(c.edit_buffer().value(), 8);
        assert_eq!(c.display_value(), DisplayValue::ZERO);
    }

    #[test]
    fn over_limit_commit_resets_and_keeps_display() {
        let mut ctx = Context::new(ResetPin::default());
        let shown = EditBuffer::new(37).and_then(EditBuffer::long_format).unwrap();
        let next = ctx.commit_action(&EntryState {
            buffer: EditBuffer::over_limit(2550),
            shown,
        });
        assert_eq!(next.buffer, EditBuffer::EMPTY);
        assert_eq!(next.shown, shown);

        let next = ctx.commit_action(&EntryState {
            buffer: EditBuffer::over_limit(MAX),
            shown: DisplayValue::ZERO,
        });
        assert_eq!(next, EntryState::default());
    }

    #[test]
    fn key_presses_stay_off_the_serial_link() {
        let (mut c, _) = controller();
        for d in 0..10 {
            let (mut c, _) = controller();
            assert_eq!(logged_bytes(|| type_number(&mut c, &[d])), 0);
        }
        assert_eq!(logged_bytes(|| press(&mut c, DEL)), 0);
        assert_eq!(logged_bytes(|| press(&mut c, STOP)), 0);
        assert_eq!(logged_bytes(|| press(&mut c, 200)), 0);

        // Widest commit line: "[INFO] Showing 1515 (entered 255)\r\n"
        type_number(&mut c, &[2, 5, 5]);
        let enter = logged_bytes(|| press(&mut c, ENTER));
        assert!(enter > 0);
        assert!(enter <= 48, "ENTER logged {} bytes", enter);
        assert_eq!(c.display_value().value(), 1515);
    }

    proptest! {
        #[test]
        fn buffer_stays_below_max(codes in proptest::collection::vec((any::<u8>(), any::<bool>()), 0..64)) {
            let (mut c, _) = controller();
            for (code, repeat) in codes {
                c.handle_ir_command(IrCommand::new(code, repeat));
                prop_assert!(c.edit_buffer().value() < MAX);
                let [high, low] = c.display_value().groups();
                prop_assert!(high <= 15 && low <= 15);
            }
        }

        #[test]
        fn digits_accumulate_in_decimal(n in 0u16..MAX) {
            let (mut c, _) = controller();
            let digits: Vec<u8> = n.to_string().bytes().map(|b| b - b'0').collect();
            type_number(&mut c, &digits);
            prop_assert_eq!(c.edit_buffer().value(), n);
        }

        #[test]
        fn repeats_never_change_state(seed in proptest::collection::vec(0u8..10, 0..3), code in any::<u8>()) {
            let (mut c, _) = controller();
            type_number(&mut c, &seed);
            let before = (c.edit_buffer(), c.display_value());
            c.handle_ir_command(IrCommand::new(code, true));
            prop_assert_eq!((c.edit_buffer(), c.display_value()), before);
        }
    }
}
