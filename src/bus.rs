use crate::ram::{merge_word, DataRam, RAM_BYTES};
use crate::rom::ROM_BYTES;
use std::env;

pub const ROM_BASE: u32 = 0x0000_0000;
pub const ROM_END: u32 = ROM_BASE + ROM_BYTES as u32;
pub const RAM_BASE: u32 = 0x1000_0000;
pub const RAM_END: u32 = RAM_BASE + RAM_BYTES as u32;
pub const OUT_REG_ADDR: u32 = 0x2000_0000;

/// Where the address decoder routes one data-side byte address.
///
/// The instruction-store range is not a data-side target; on this side it
/// decodes as [`BusTarget::Unmapped`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusTarget {
    Ram { word_index: usize },
    OutputReg,
    Unmapped,
}

/// Pure range-membership decode. Every address lands on exactly one target;
/// the data store ignores the low two address bits.
pub fn decode_address(addr: u32) -> BusTarget {
    if (RAM_BASE..RAM_END).contains(&addr) {
        BusTarget::Ram {
            word_index: ((addr - RAM_BASE) >> 2) as usize,
        }
    } else if addr == OUT_REG_ADDR {
        BusTarget::OutputReg
    } else {
        BusTarget::Unmapped
    }
}

#[derive(Debug, Clone, Copy)]
enum OutRequest {
    Read,
    Write { data: u32, mask: u8 },
}

/// The single memory-mapped word at [`OUT_REG_ADDR`]. Bus accesses follow
/// the same masked one-request-per-cycle contract as the data store, while
/// [`value`](Self::value) is the externally wired live view that drives the
/// output pins.
#[derive(Debug, Clone, Default)]
pub struct OutputRegister {
    value: u32,
    rdata: u32,
    pending: Option<OutRequest>,
}

impl OutputRegister {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn bit(&self, n: u32) -> bool {
        (self.value >> n) & 1 == 1
    }

    pub(crate) fn set_value(&mut self, value: u32) {
        self.value = value;
    }

    pub fn issue_read(&mut self) {
        debug_assert!(self.pending.is_none(), "one request per cycle");
        self.pending = Some(OutRequest::Read);
    }

    pub fn issue_write(&mut self, data: u32, mask: u8) {
        debug_assert!(self.pending.is_none(), "one request per cycle");
        self.pending = Some(OutRequest::Write { data, mask });
    }

    pub fn rdata(&self) -> u32 {
        self.rdata
    }

    pub fn tick(&mut self) {
        match self.pending.take() {
            Some(OutRequest::Read) => self.rdata = self.value,
            Some(OutRequest::Write { data, mask }) => {
                self.value = merge_word(self.value, data, mask);
            }
            None => {}
        }
    }

    /// Reset drives the register back to zero.
    pub fn reset(&mut self) {
        self.value = 0;
        self.rdata = 0;
        self.pending = None;
    }
}

/// One write as routed by the decoder, for diagnostic capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteRecord {
    pub addr: u32,
    pub data: u32,
    pub mask: u8,
}

/// Data-side interconnect. Routes at most one engine request per cycle to
/// the data store or the output register. Unmapped reads return zero,
/// unmapped writes are dropped; neither faults.
#[derive(Debug, Clone)]
pub struct DataBus {
    pub ram: DataRam,
    pub out: OutputRegister,
    sel: BusTarget,
    pending_sel: Option<BusTarget>,
    capture: Option<Vec<WriteRecord>>,
}

impl Default for DataBus {
    fn default() -> Self {
        Self::new()
    }
}

impl DataBus {
    pub fn new() -> Self {
        Self {
            ram: DataRam::new(),
            out: OutputRegister::new(),
            sel: BusTarget::Unmapped,
            pending_sel: None,
            capture: None,
        }
    }

    pub fn issue_read(&mut self, addr: u32) {
        let target = decode_address(addr);
        self.pending_sel = Some(target);
        match target {
            BusTarget::Ram { word_index } => self.ram.issue_read(word_index),
            BusTarget::OutputReg => self.out.issue_read(),
            BusTarget::Unmapped => {}
        }
    }

    pub fn issue_write(&mut self, addr: u32, data: u32, mask: u8) {
        let target = decode_address(addr);
        if env::var("RV5SOC_BUS_TRACE").is_ok() {
            eprintln!(
                "[bus-store] addr=0x{addr:08X} data=0x{data:08X} mask=0b{mask:04b} target={target:?}"
            );
        }
        match target {
            BusTarget::Ram { word_index } => {
                self.ram.issue_write(word_index, data, mask);
                self.record(WriteRecord { addr, data, mask });
            }
            BusTarget::OutputReg => {
                self.out.issue_write(data, mask);
                self.record(WriteRecord { addr, data, mask });
            }
            BusTarget::Unmapped => {}
        }
    }

    /// Read response as latched at the most recent edge, muxed from the
    /// target of the most recent read request.
    pub fn rdata(&self) -> u32 {
        match self.sel {
            BusTarget::Ram { .. } => self.ram.rdata(),
            BusTarget::OutputReg => self.out.rdata(),
            BusTarget::Unmapped => 0,
        }
    }

    /// Clock edge: commit pending requests in both stores and the response
    /// mux select.
    pub fn tick(&mut self) {
        self.ram.tick();
        self.out.tick();
        if let Some(target) = self.pending_sel.take() {
            self.sel = target;
        }
    }

    pub fn reset(&mut self) {
        self.ram.reset_port();
        self.out.reset();
        self.sel = BusTarget::Unmapped;
        self.pending_sel = None;
    }

    /// Start recording routed writes. Any capture already in progress is
    /// discarded.
    pub fn begin_write_capture(&mut self) {
        self.capture = Some(Vec::new());
    }

    /// Stop recording and return everything captured since
    /// [`begin_write_capture`](Self::begin_write_capture).
    pub fn take_write_capture(&mut self) -> Vec<WriteRecord> {
        self.capture.take().unwrap_or_default()
    }

    fn record(&mut self, record: WriteRecord) {
        if let Some(log) = self.capture.as_mut() {
            log.push(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoder_covers_the_whole_map() {
        assert_eq!(decode_address(0x0000_0000), BusTarget::Unmapped);
        assert_eq!(decode_address(0x0000_0100), BusTarget::Unmapped);
        assert_eq!(decode_address(0x0FFF_FFFF), BusTarget::Unmapped);
        assert_eq!(decode_address(RAM_BASE), BusTarget::Ram { word_index: 0 });
        assert_eq!(decode_address(RAM_BASE + 4), BusTarget::Ram { word_index: 1 });
        assert_eq!(
            decode_address(RAM_END - 4),
            BusTarget::Ram { word_index: 1023 }
        );
        assert_eq!(
            decode_address(RAM_END - 1),
            BusTarget::Ram { word_index: 1023 },
            "low address bits are ignored inside the window"
        );
        assert_eq!(decode_address(RAM_END), BusTarget::Unmapped);
        assert_eq!(decode_address(OUT_REG_ADDR), BusTarget::OutputReg);
        assert_eq!(decode_address(OUT_REG_ADDR + 4), BusTarget::Unmapped);
        assert_eq!(decode_address(0xFFFF_FFFF), BusTarget::Unmapped);
    }

    #[test]
    fn unmapped_accesses_never_fault() {
        let mut bus = DataBus::new();
        bus.issue_write(0x3000_0000, 0xFFFF_FFFF, 0b1111);
        bus.tick();
        assert_eq!(bus.ram.word(0), 0, "dropped write must not reach the ram");
        assert_eq!(bus.out.value(), 0, "dropped write must not reach the output register");

        bus.issue_read(0x3000_0000);
        bus.tick();
        assert_eq!(bus.rdata(), 0, "unmapped reads return zero");
    }

    #[test]
    fn output_register_write_lands_at_the_edge() {
        let mut bus = DataBus::new();
        bus.issue_write(OUT_REG_ADDR, 1, 0b1111);
        assert_eq!(bus.out.value(), 0, "store has one cycle of latency");
        bus.tick();
        assert_eq!(bus.out.value(), 1);
    }

    #[test]
    fn read_mux_follows_the_requested_target() {
        let mut bus = DataBus::new();
        bus.issue_write(RAM_BASE + 20, 0x77, 0b1111);
        bus.tick();
        bus.issue_write(OUT_REG_ADDR, 0x33, 0b1111);
        bus.tick();

        bus.issue_read(RAM_BASE + 20);
        bus.tick();
        assert_eq!(bus.rdata(), 0x77);

        bus.issue_read(OUT_REG_ADDR);
        bus.tick();
        assert_eq!(bus.rdata(), 0x33);
    }

    #[test]
    fn capture_records_routed_writes_only() {
        let mut bus = DataBus::new();
        bus.begin_write_capture();

        bus.issue_write(RAM_BASE, 0x11, 0b1111);
        bus.tick();
        bus.issue_write(OUT_REG_ADDR, 0x22, 0b0001);
        bus.tick();
        bus.issue_write(0x4000_0000, 0x33, 0b1111);
        bus.tick();

        let captured = bus.take_write_capture();
        assert_eq!(
            captured,
            vec![
                WriteRecord { addr: RAM_BASE, data: 0x11, mask: 0b1111 },
                WriteRecord { addr: OUT_REG_ADDR, data: 0x22, mask: 0b0001 },
            ],
            "the dropped write must not appear"
        );
    }

    #[test]
    fn output_register_honours_byte_masks() {
        let mut bus = DataBus::new();
        bus.issue_write(OUT_REG_ADDR, 0xFFFF_FFFF, 0b1111);
        bus.tick();
        bus.issue_write(OUT_REG_ADDR, 0x0000_0000, 0b0001);
        bus.tick();
        assert_eq!(bus.out.value(), 0xFFFF_FF00);
    }
}
