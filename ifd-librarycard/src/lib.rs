//! IFD Handler for the virtual library membership card
//!
//! This is a PC/SC IFD (Interface Device) handler that implements a virtual
//! smart card reader with an embedded library card applet. Host software
//! (the library desk GUI, test harnesses) talks to the card through pcscd
//! exactly as it would to a physical Java Card.

// Allow raw pointer dereference in extern "C" functions - required for PC/SC IFD API
#![allow(clippy::not_unsafe_ptr_arg_deref)]
// Allow uppercase acronyms for the pcsc-lite type names (DWORD, LPSTR, etc.)
#![allow(clippy::upper_case_acronyms)]

pub mod apdu;
pub mod card;
pub mod config;
pub mod crypto;
pub mod library;

use log::{debug, error, info, warn};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::ffi::{c_char, c_uchar, c_ulong, CStr};
use std::ptr;
use std::sync::Arc;

use apdu::{ins, parse_apdu, Response, SW};
use card::{atr, CardDataStore};
use config::CardConfig;
use library::LibraryCardApplet;

// PC/SC lite types
type DWORD = c_ulong;
type PDWORD = *mut DWORD;
type PUCHAR = *mut c_uchar;
type LPSTR = *const c_char;
type RESPONSECODE = c_ulong;
type UCHAR = c_uchar;

// Response codes
const IFD_SUCCESS: RESPONSECODE = 0;
const IFD_ERROR_TAG: RESPONSECODE = 600;
const IFD_ERROR_NOT_SUPPORTED: RESPONSECODE = 606;
const IFD_COMMUNICATION_ERROR: RESPONSECODE = 612;
const IFD_ICC_PRESENT: RESPONSECODE = 615;
const IFD_ICC_NOT_PRESENT: RESPONSECODE = 614;

// Tags for GetCapabilities
const TAG_IFD_ATR: DWORD = 0x0303;
const TAG_IFD_SLOTS_NUMBER: DWORD = 0x0FAE;
const TAG_IFD_THREAD_SAFE: DWORD = 0x0FAD;
const TAG_IFD_SLOT_THREAD_SAFE: DWORD = 0x0FBE;

// Power actions
const IFD_POWER_UP: DWORD = 500;
const IFD_POWER_DOWN: DWORD = 501;
const IFD_RESET: DWORD = 502;

// SCARD_IO_HEADER structure (simplified)
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SCARD_IO_HEADER {
    pub protocol: DWORD,
    pub length: DWORD,
}

// Maximum ATR size
const MAX_ATR_SIZE: usize = 33;

/// Virtual card hosting the library applet
///
/// Plays the secure element: it answers reset, tracks power and selection,
/// and feeds raw command APDUs to the applet.
pub struct VirtualCard {
    applet: LibraryCardApplet,
    atr: Vec<u8>,
    powered: bool,
    selected: bool,
}

impl VirtualCard {
    /// Create a card around an applet, powered off
    pub fn new(applet: LibraryCardApplet) -> Self {
        Self {
            applet,
            atr: atr::library_atr(),
            powered: false,
            selected: false,
        }
    }

    /// Create a card whose storage and signing profile come from `config`
    pub fn from_config(config: &CardConfig) -> Self {
        let mut store = CardDataStore::new(config.storage_dir.clone());
        store.load();
        Self::new(LibraryCardApplet::new(store, config.signing.clone()))
    }

    /// Power on the card, returning the ATR
    pub fn power_on(&mut self) -> Vec<u8> {
        self.powered = true;
        self.deselect();
        info!("Virtual card powered on");
        self.atr.clone()
    }

    /// Power off the card
    pub fn power_off(&mut self) {
        self.powered = false;
        self.deselect();
        info!("Virtual card powered off");
    }

    /// Warm reset, returning the ATR
    pub fn reset(&mut self) -> Vec<u8> {
        self.powered = true;
        self.deselect();
        info!("Virtual card reset");
        self.atr.clone()
    }

    pub fn is_powered(&self) -> bool {
        self.powered
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn atr(&self) -> &[u8] {
        &self.atr
    }

    pub fn applet(&self) -> &LibraryCardApplet {
        &self.applet
    }

    pub fn applet_mut(&mut self) -> &mut LibraryCardApplet {
        &mut self.applet
    }

    /// Process a raw command APDU and return `data || SW1 SW2`
    pub fn process_apdu(&mut self, apdu_bytes: &[u8]) -> Vec<u8> {
        if !self.powered {
            return Response::error(SW::CONDITIONS_NOT_SATISFIED).to_bytes();
        }

        let cmd = match parse_apdu(apdu_bytes) {
            Ok(apdu) => apdu,
            Err(e) => {
                error!("Failed to parse APDU: {}", e);
                return Response::error(SW::WRONG_LENGTH).to_bytes();
            }
        };

        debug!(
            "Processing APDU: CLA={:02X} INS={:02X} P1={:02X} P2={:02X}",
            cmd.cla, cmd.ins, cmd.p1, cmd.p2
        );

        if cmd.ins == ins::SELECT {
            let response = self.applet.process_apdu(&cmd);
            if response.is_okay() {
                self.selected = true;
            }
            return response.to_bytes();
        }

        if !self.selected {
            debug!("No applet selected");
            return Response::error(SW::CONDITIONS_NOT_SATISFIED).to_bytes();
        }

        self.applet.process_apdu(&cmd).to_bytes()
    }

    fn deselect(&mut self) {
        self.selected = false;
        self.applet.deselect();
    }
}

/// Global state for the IFD handler
struct IfdState {
    /// Card per slot (only slot 0 exists)
    slots: [Option<Arc<Mutex<VirtualCard>>>; 1],
}

impl IfdState {
    fn new() -> Self {
        Self { slots: [None] }
    }
}

static IFD_STATE: OnceCell<Mutex<IfdState>> = OnceCell::new();

fn get_state() -> &'static Mutex<IfdState> {
    IFD_STATE.get_or_init(|| Mutex::new(IfdState::new()))
}

fn slot_index(lun: DWORD) -> usize {
    (lun & 0xFFFF) as usize
}

/// Clone the card handle of a slot so the global lock can be released early
fn slot_card(lun: DWORD) -> Option<Arc<Mutex<VirtualCard>>> {
    let state = get_state().lock();
    state.slots.get(slot_index(lun))?.clone()
}

/// Install a fresh card in a slot
fn open_slot(lun: DWORD) -> RESPONSECODE {
    let mut state = get_state().lock();
    let Some(slot) = state.slots.get_mut(slot_index(lun)) else {
        error!("Invalid slot: {}", slot_index(lun));
        return IFD_COMMUNICATION_ERROR;
    };

    let config = CardConfig::from_env();
    debug!("Card storage in {:?}", config.storage_dir);
    *slot = Some(Arc::new(Mutex::new(VirtualCard::from_config(&config))));
    info!("Channel created (embedded library card)");
    IFD_SUCCESS
}

/// Copy `src` into a caller buffer of `capacity` bytes and report the length written
///
/// # Safety
/// `dst` must be valid for `capacity` bytes and `len_out` must be writable.
unsafe fn copy_out(src: &[u8], dst: PUCHAR, capacity: usize, len_out: PDWORD) {
    let copy_len = src.len().min(capacity);
    if !dst.is_null() {
        ptr::copy_nonoverlapping(src.as_ptr(), dst, copy_len);
    }
    *len_out = copy_len as DWORD;
}

// ============================================================================
// IFD Handler API Implementation
// ============================================================================

/// Create a communication channel to the reader
#[no_mangle]
pub extern "C" fn IFDHCreateChannelByName(lun: DWORD, device_name: LPSTR) -> RESPONSECODE {
    let name = if device_name.is_null() {
        "null".to_string()
    } else {
        unsafe { CStr::from_ptr(device_name) }.to_string_lossy().to_string()
    };
    info!("IFDHCreateChannelByName: LUN={}, device={}", lun, name);
    open_slot(lun)
}

/// Create a communication channel (legacy)
#[no_mangle]
pub extern "C" fn IFDHCreateChannel(lun: DWORD, channel: DWORD) -> RESPONSECODE {
    info!("IFDHCreateChannel: LUN={}, channel={}", lun, channel);
    open_slot(lun)
}

/// Close the communication channel
#[no_mangle]
pub extern "C" fn IFDHCloseChannel(lun: DWORD) -> RESPONSECODE {
    info!("IFDHCloseChannel: LUN={}", lun);

    let mut state = get_state().lock();
    let Some(slot) = state.slots.get_mut(slot_index(lun)) else {
        return IFD_COMMUNICATION_ERROR;
    };
    if let Some(card) = slot.take() {
        card.lock().power_off();
    }
    IFD_SUCCESS
}

/// Get reader capabilities
#[no_mangle]
pub extern "C" fn IFDHGetCapabilities(
    lun: DWORD,
    tag: DWORD,
    length: PDWORD,
    value: PUCHAR,
) -> RESPONSECODE {
    debug!("IFDHGetCapabilities: LUN={}, tag=0x{:04X}", lun, tag);

    if length.is_null() {
        return IFD_COMMUNICATION_ERROR;
    }

    match tag {
        TAG_IFD_ATR => {
            let Some(card) = slot_card(lun) else {
                return IFD_ICC_NOT_PRESENT;
            };
            let card = card.lock();
            if !card.is_powered() {
                return IFD_ICC_NOT_PRESENT;
            }
            unsafe { copy_out(card.atr(), value, MAX_ATR_SIZE, length) };
            IFD_SUCCESS
        }
        // One slot; slot-level calls are serialized by the slot mutex
        TAG_IFD_SLOTS_NUMBER | TAG_IFD_SLOT_THREAD_SAFE => {
            unsafe { copy_out(&[1], value, 1, length) };
            IFD_SUCCESS
        }
        TAG_IFD_THREAD_SAFE => {
            unsafe { copy_out(&[0], value, 1, length) };
            IFD_SUCCESS
        }
        _ => {
            debug!("Unknown tag: 0x{:04X}", tag);
            IFD_ERROR_TAG
        }
    }
}

/// Set reader capabilities (not supported)
#[no_mangle]
pub extern "C" fn IFDHSetCapabilities(
    _lun: DWORD,
    _tag: DWORD,
    _length: DWORD,
    _value: PUCHAR,
) -> RESPONSECODE {
    IFD_ERROR_NOT_SUPPORTED
}

/// Set protocol parameters (T=1 only, nothing to negotiate)
#[no_mangle]
pub extern "C" fn IFDHSetProtocolParameters(
    lun: DWORD,
    protocol: DWORD,
    _flags: UCHAR,
    _pts1: UCHAR,
    _pts2: UCHAR,
    _pts3: UCHAR,
) -> RESPONSECODE {
    debug!("IFDHSetProtocolParameters: LUN={}, protocol={}", lun, protocol);
    IFD_SUCCESS
}

/// Power the ICC (Integrated Circuit Card)
#[no_mangle]
pub extern "C" fn IFDHPowerICC(
    lun: DWORD,
    action: DWORD,
    atr: PUCHAR,
    atr_length: PDWORD,
) -> RESPONSECODE {
    debug!("IFDHPowerICC: LUN={}, action={}", lun, action);

    let Some(card) = slot_card(lun) else {
        return IFD_COMMUNICATION_ERROR;
    };
    let mut card = card.lock();

    let card_atr = match action {
        IFD_POWER_UP => card.power_on(),
        IFD_RESET => card.reset(),
        IFD_POWER_DOWN => {
            card.power_off();
            return IFD_SUCCESS;
        }
        _ => {
            warn!("Unknown power action: {}", action);
            return IFD_ERROR_NOT_SUPPORTED;
        }
    };

    if !atr.is_null() && !atr_length.is_null() {
        unsafe { copy_out(&card_atr, atr, MAX_ATR_SIZE, atr_length) };
    }
    IFD_SUCCESS
}

/// Transmit data to the ICC
#[no_mangle]
pub extern "C" fn IFDHTransmitToICC(
    lun: DWORD,
    send_pci: SCARD_IO_HEADER,
    tx_buffer: PUCHAR,
    tx_length: DWORD,
    rx_buffer: PUCHAR,
    rx_length: PDWORD,
    _recv_pci: *mut SCARD_IO_HEADER,
) -> RESPONSECODE {
    debug!(
        "IFDHTransmitToICC: LUN={}, protocol={}, tx_len={}",
        lun, send_pci.protocol, tx_length
    );

    if tx_buffer.is_null() || rx_buffer.is_null() || rx_length.is_null() {
        return IFD_COMMUNICATION_ERROR;
    }

    let Some(card) = slot_card(lun) else {
        return IFD_COMMUNICATION_ERROR;
    };

    let apdu = unsafe { std::slice::from_raw_parts(tx_buffer, tx_length as usize) };
    let response = card.lock().process_apdu(apdu);

    let capacity = unsafe { *rx_length } as usize;
    if response.len() > capacity {
        warn!("Response of {} bytes truncated to {}", response.len(), capacity);
    }
    unsafe { copy_out(&response, rx_buffer, capacity, rx_length) };
    IFD_SUCCESS
}

/// Check if ICC is present
#[no_mangle]
pub extern "C" fn IFDHICCPresence(lun: DWORD) -> RESPONSECODE {
    // The virtual card is present whenever its channel is open
    if slot_card(lun).is_some() {
        IFD_ICC_PRESENT
    } else {
        IFD_ICC_NOT_PRESENT
    }
}

/// Control the reader (not supported)
#[no_mangle]
pub extern "C" fn IFDHControl(
    _lun: DWORD,
    _control_code: DWORD,
    _tx_buffer: PUCHAR,
    _tx_length: DWORD,
    _rx_buffer: PUCHAR,
    _rx_length: DWORD,
    _bytes_returned: PDWORD,
) -> RESPONSECODE {
    IFD_ERROR_NOT_SUPPORTED
}
