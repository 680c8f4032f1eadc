#![no_std]
#![no_main]

// links
// https://github.com/stm32-rs/stm32f3xx-hal/tree/master/examples
//
// ir receiver
// https://docs.rs/infrared/0.10.0/infrared/

use panic_abort as _;
use stm32f3xx_hal as hal;

use core::sync::atomic::{AtomicU32, Ordering::Relaxed};
use cortex_m::{interrupt::free as interrupt_free, peripheral::NVIC};
use cortex_m_rt::{entry, exception, ExceptionFrame};
use hal::{
    gpio::{gpioa::PAx, gpiob::PBx, gpiob::PB6, Floating, Input, Output, PushPull},
    pac::{self, interrupt},
    prelude::*,
    serial::{Serial, Tx},
    timer::{Event, Timer},
};
use log::{error, info, warn};
use remote_display_lib::*;

type IrPin = PB6<Input<Floating>>;
type SegmentPin = PAx<Output<PushPull>>;
type GroundPin = PBx<Output<PushPull>>;

static LOGGER: Logger<Tx<pac::USART1>> = Logger::new();
static SYS_CLOCK: SystemClock = SystemClock::new();

// Owned by the TIM2 handler once it is unmasked
static mut IR_TIMER: Option<Timer<pac::TIM2>> = None;
static mut IR_RECEIVER: Option<IrReceiver<IrPin>> = None;
static mut IR_QUEUE: IrCommandQueue = IrCommandQueue::new();

// Can't log from the interrupt, the main loop reports these
static IR_DROPPED: AtomicU32 = AtomicU32::new(0);
static IR_ERRORS: AtomicU32 = AtomicU32::new(0);

#[entry]
fn main() -> ! {
    let dp = pac::Peripherals::take().expect("Failed to take pac::Peripherals");
    let cp =
        cortex_m::peripheral::Peripherals::take().expect("Failed to take cortex_m::Peripherals");

    // Setup system clock
    let mut flash = dp.FLASH.constrain();
    let mut rcc = dp.RCC.constrain();
    let clocks = rcc
        .cfgr
        .use_hse(8.mhz())
        .sysclk(48.mhz())
        .pclk1(24.mhz())
        .pclk2(24.mhz())
        .freeze(&mut flash.acr);

    let mut gpioa = dp.GPIOA.split(&mut rcc.ahb);
    let mut gpiob = dp.GPIOB.split(&mut rcc.ahb);

    // Reset line is active low, release it before anything else
    let mut reset_line = gpiob
        .pb10
        .into_push_pull_output(&mut gpiob.moder, &mut gpiob.otyper);
    reset_line.set_high().ok();

    // UART logger, 115200 8N1 on PA9/PA10
    let tx = gpioa.pa9.into_af7(&mut gpioa.moder, &mut gpioa.afrh);
    let rx = gpioa.pa10.into_af7(&mut gpioa.moder, &mut gpioa.afrh);
    let serial = Serial::usart1(dp.USART1, (tx, rx), 115200.bps(), clocks, &mut rcc.apb2);
    let (serial_tx, _serial_rx) = serial.split();
    unsafe {
        LOGGER.set_inner(serial_tx);
        log::set_logger(&LOGGER).unwrap();
    }
    log::set_max_level(DEFAULT_LOG_LEVEL);

    // Segment lines G F E D C B A DP on PA0..PA7
    let segments: [SegmentPin; SEGMENT_COUNT] = [
        gpioa
            .pa0
            .into_push_pull_output(&mut gpioa.moder, &mut gpioa.otyper)
            .downgrade(),
        gpioa
            .pa1
            .into_push_pull_output(&mut gpioa.moder, &mut gpioa.otyper)
            .downgrade(),
        gpioa
            .pa2
            .into_push_pull_output(&mut gpioa.moder, &mut gpioa.otyper)
            .downgrade(),
        gpioa
            .pa3
            .into_push_pull_output(&mut gpioa.moder, &mut gpioa.otyper)
            .downgrade(),
        gpioa
            .pa4
            .into_push_pull_output(&mut gpioa.moder, &mut gpioa.otyper)
            .downgrade(),
        gpioa
            .pa5
            .into_push_pull_output(&mut gpioa.moder, &mut gpioa.otyper)
            .downgrade(),
        gpioa
            .pa6
            .into_push_pull_output(&mut gpioa.moder, &mut gpioa.otyper)
            .downgrade(),
        gpioa
            .pa7
            .into_push_pull_output(&mut gpioa.moder, &mut gpioa.otyper)
            .downgrade(),
    ];

    // Digit commons on PB0 (high group) and PB1 (low group)
    let grounds: [GroundPin; DIGIT_COUNT] = [
        gpiob
            .pb0
            .into_push_pull_output(&mut gpiob.moder, &mut gpiob.otyper)
            .downgrade(),
        gpiob
            .pb1
            .into_push_pull_output(&mut gpiob.moder, &mut gpiob.otyper)
            .downgrade(),
    ];

    // System clock tracking millis, interrupt driven
    SYS_CLOCK.enable_systick_interrupt(cp.SYST, clocks);

    let mut display = Display::new(
        segments,
        grounds,
        SysTickDelay::new(&SYS_CLOCK, drain_log),
    );
    display.blank().map_err(|e| error!("{}", e)).ok();

    let mut controller = Controller::new(reset_line);

    // IR receiver sampled at IR_SAMPLE_RATE from TIM2
    let ir_pin: IrPin = gpiob
        .pb6
        .into_floating_input(&mut gpiob.moder, &mut gpiob.pupdr);
    let mut ir_timer = Timer::tim2(dp.TIM2, IR_SAMPLE_RATE.hz(), clocks, &mut rcc.apb1);
    ir_timer.listen(Event::Update);
    unsafe {
        IR_RECEIVER.replace(IrReceiver::new(ir_pin, IR_SAMPLE_RATE));
        IR_TIMER.replace(ir_timer);
        NVIC::unmask(pac::Interrupt::TIM2);
    }

    info!("Remote display initialized");

    let mut reported_dropped = 0;
    let mut reported_errors = 0;
    let mut reported_log_dropped = 0;
    loop {
        let log_dropped = LOGGER.dropped();
        if log_dropped != reported_log_dropped {
            warn!("Log queue full, {} bytes dropped", log_dropped);
            reported_log_dropped = log_dropped;
        }

        let dropped = IR_DROPPED.load(Relaxed);
        if dropped != reported_dropped {
            warn!("IR queue full, {} commands dropped", dropped);
            reported_dropped = dropped;
        }
        let errors = IR_ERRORS.load(Relaxed);
        if errors != reported_errors {
            warn!("IR decode errors: {}", errors);
            reported_errors = errors;
        }

        if let Some(cmd) = interrupt_free(|_| unsafe { IR_QUEUE.dequeue() }) {
            controller.handle_ir_command(cmd);
        }

        display
            .render(controller.display_value())
            .map_err(|e| error!("{}", e))
            .ok();
    }
}

// Runs while the display holds a digit
fn drain_log() {
    LOGGER.drain();
}

#[interrupt]
fn TIM2() {
    let timer = unsafe { IR_TIMER.as_mut() };
    if let Some(timer) = timer {
        timer.clear_update_interrupt_flag();
    }

    let receiver = unsafe { IR_RECEIVER.as_mut() };
    if let Some(receiver) = receiver {
        match receiver.poll() {
            Ok(Some(cmd)) => {
                let queue = unsafe { &mut IR_QUEUE };
                if queue.enqueue(cmd.into()).is_err() {
                    IR_DROPPED.fetch_add(1, Relaxed);
                }
            }
            Ok(None) => (),
            Err(_) => {
                IR_ERRORS.fetch_add(1, Relaxed);
            }
        }
    }
}

#[exception]
fn SysTick() {
    SYS_CLOCK.inc_from_interrupt();
}

#[exception]
fn HardFault(ef: &ExceptionFrame) -> ! {
    panic!("HardFault at {:#?}", ef);
}

#[exception]
fn DefaultHandler(irqn: i16) {
    panic!("Unhandled exception (IRQn = {})", irqn);
}
