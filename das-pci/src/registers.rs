//! Register map of the DAS1602/16 family
//!
//! The board exposes five BAR windows. All driver access goes
//! through 16 bit word reads/writes at the offsets below;
//! several registers carry different fields for read and
//! write, those are listed twice.
//!
//! window 0 - AMCC PCI controller (interrupt routing)
//! window 1 - ADC control block (IRQ, mux, trigger, calib, DAC ctrl)
//! window 2 - ADC data FIFO
//! window 3 - 8254 counter cascades and 8255 DIO
//! window 4 - DAC data FIFO

//========== AMCC PCI controller (window 0) =============

pub const INTCSR_ADDR  : u32 = 0x38;       // interrupt control/status
pub const BMCSR_ADDR   : u32 = 0x3c;       // bus master control/status
pub const INTCSR_DWORD : u32 = 0x00FF1F00; // route add-on interrupt to PCI INTA
pub const BMCSR_DWORD  : u32 = 0x08000000; // reset add-on interrupt flags

//========== IRQ_REG  window 1 + 0x0 =============
// Interrupt / ADC FIFO register

/* write */
pub const INT0   : u16 = 0x1;    // general interrupt source select
pub const INT1   : u16 = 0x2;
pub const INTE   : u16 = 0x4;    // 1=interrupts enabled
pub const DAHFIE : u16 = 0x8;    // 1=enable DAC FIFO half-full interrupt
pub const EOAIE  : u16 = 0x10;   // 1=enable end-of-acquisition interrupt
pub const DAHFCL : u16 = 0x20;   // 1=clear DAC FIFO half-full latch
pub const EOACL  : u16 = 0x40;   // 1=clear EOA latch
pub const INTCL  : u16 = 0x80;   // 1=clear INT[1:0] latch
pub const DAEMIE : u16 = 0x1000; // 1=enable DAC FIFO empty interrupt
pub const ADFLCL : u16 = 0x2000; // 1=clear ADC FIFO full latch
pub const DAEMCL : u16 = 0x4000; // 1=clear DAC FIFO empty latch
// write-clear bits self reset, no second write needed

/* read */
pub const DAHFI  : u16 = 0x20;   // DAC FIFO half-full latched
pub const EOAI   : u16 = 0x40;   // end-of-acquisition latched
pub const INT    : u16 = 0x80;   // general interrupt latched
pub const XINTI  : u16 = 0x100;  // external interrupt latched
pub const EOBI   : u16 = 0x200;  // end-of-burst latched
pub const ADHFI  : u16 = 0x400;  // ADC FIFO half-full latched
pub const ADNEI  : u16 = 0x800;  // ADC FIFO not-empty interrupt occurred
pub const ADNE   : u16 = 0x1000; // ADC FIFO not empty (live, not latched)
pub const LADFUL : u16 = 0x2000; // ADC FIFO overran, data lost
pub const DAEMI  : u16 = 0x4000; // DAC FIFO empty condition occurred

//========== MUX_REG  window 1 + 0x2 =============
// ADC channel mux and control register

/* write */
pub const GS0    : u16 = 0x100;  // gain range select
pub const GS1    : u16 = 0x200;
pub const SEDIFF : u16 = 0x400;  // 1=single ended (16 ch), 0=differential (8 ch)
pub const UNIBIP : u16 = 0x800;  // 1=unipolar, 0=bipolar
pub const ADPS0  : u16 = 0x1000; // ADC pacer source select
pub const ADPS1  : u16 = 0x2000;

/* read */
pub const EOC    : u16 = 0x4000; // 1=conversion done, 0=ADC busy

//========== TRIG_REG  window 1 + 0x4 =============
// Trigger control / status register

/* write */
pub const TS0    : u16 = 0x1;    // trigger source select
pub const TS1    : u16 = 0x2;
pub const TGPOL  : u16 = 0x4;    // 1=external trigger inverted
pub const TGSEL  : u16 = 0x8;    // 1=edge triggered, 0=level
pub const TGEN   : u16 = 0x10;   // 1=selected trigger source enabled
pub const BURSTE : u16 = 0x20;   // 1=burst mode enabled
pub const PRTRG  : u16 = 0x40;   // 1=pretrigger mode enabled
pub const XTRCL  : u16 = 0x80;   // 1=clear XTRIG status
pub const CLO_EN : u16 = 0x100;
pub const CHI_EN : u16 = 0x200;
pub const HMODE  : u16 = 0x400;
pub const ARM    : u16 = 0x800;  // arm the residual counter
pub const FFM0   : u16 = 0x1000; // 1=start residual counter now, 0=arm on ADHF
pub const C0SRC  : u16 = 0x2000; // 1=internal 10 MHz oscillator for counter 0

/* read */
pub const XTRIG   : u16 = 0x80;   // external trigger received
pub const INDX_GT : u16 = 0x1000; // pretrigger index counter complete

//========== CALIBRATE_REG  window 1 + 0x6 =============
// Serial interface to the trim DACs and the coefficient NVRAM

pub const SEL8800 : u16 = 0x100;
pub const SEL8402 : u16 = 0x200;
pub const SEL08   : u16 = 0x400;
pub const CALEN   : u16 = 0x4000;
pub const SDI     : u16 = 0x8000;

//========== DAC_REG  window 1 + 0x8 =============
// DAC control / status register

/* write */
pub const LDAEMCL : u16 = 0x1;   // 1=reset empty flag
pub const DACEN   : u16 = 0x2;   // 1=DAC0/1 enabled
pub const START   : u16 = 0x4;   // 1=start/arm FIFO operation
pub const DAPS0   : u16 = 0x8;   // DAC pacer source select
pub const DAPS1   : u16 = 0x10;
pub const HS0     : u16 = 0x20;  // high speed DAC mode select
pub const HS1     : u16 = 0x40;
pub const DAC0R0  : u16 = 0x100; // independent DAC gain/range select
pub const DAC0R1  : u16 = 0x200;
pub const DAC1R0  : u16 = 0x400;
pub const DAC1R1  : u16 = 0x800;

/* read */
pub const LDAEM   : u16 = 0x1;   // DAC FIFO ran empty

//========== word offsets inside the windows =============

/// window 1 register offsets (bytes)
pub const IRQ_REG       : u32 = 0x0;
pub const MUX_REG       : u32 = 0x2;
pub const TRIG_REG      : u32 = 0x4;
pub const CALIBRATE_REG : u32 = 0x6;
pub const DAC_REG       : u32 = 0x8;

/// window 2: reading pops the ADC FIFO, any write clears it
pub const ADC_DATA_REG  : u32 = 0x0;

/// window 3: ADC pacer cascade (8254 "A"), 8255 DIO,
/// DAC pacer cascade (8254 "B")
pub const COUNTERA_0_DATA : u32 = 0x0;
pub const COUNTERA_1_DATA : u32 = 0x1;
pub const COUNTERA_2_DATA : u32 = 0x2;
pub const COUNTERA_CTRL   : u32 = 0x3;
pub const DIO_PORTA       : u32 = 0x4;
pub const DIO_PORTB       : u32 = 0x5;
pub const DIO_PORTC       : u32 = 0x6;
pub const DIO_CNTRL_REG   : u32 = 0x7;
pub const COUNTERB_0_DATA : u32 = 0x8;
pub const COUNTERB_1_DATA : u32 = 0x9;
pub const COUNTERB_2_DATA : u32 = 0xa;
pub const COUNTERB_CTRL   : u32 = 0xb;

/// window 4 DAC output data
pub const DAC0_DATA_REG : u32 = 0x0;
pub const DAC1_DATA_REG : u32 = 0x2;

//========== 8254 counter programming =============

pub const MODE0 : u8 = 0x0;
pub const MODE1 : u8 = 0x2;
pub const MODE2 : u8 = 0x4;  // rate generator, used for both pacer counters
pub const MODE3 : u8 = 0x6;
pub const MODE4 : u8 = 0x8;
pub const MODE5 : u8 = 0xa;

pub const C0 : u8 = 0x00;
pub const C1 : u8 = 0x40;
pub const C2 : u8 = 0x80;

pub const CNTLATCH : u8 = 0x00;
pub const LSBONLY  : u8 = 0x10;
pub const MSBONLY  : u8 = 0x20;
pub const LSBFIRST : u8 = 0x30; // LSB then MSB, the load order the pacer uses
