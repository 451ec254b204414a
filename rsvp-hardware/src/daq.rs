//! Digital output on Measurement Computing devices (e.g. USB-1208FS-Plus).
//!
//! The backend wraps the few `uldaq` C functions needed to drive one 8-bit
//! port. It is compiled only with the `mcc-daq` feature; without it
//! [`open_daq`] reports the output as unavailable.

use crate::pulse::DigitalOutput;
use crate::status::HardwareError;

/// `uldaq` DigitalPortType values for the port names accepted in the config.
pub fn port_type(name: &str) -> Result<i32, HardwareError> {
    match name.trim().to_ascii_uppercase().as_str() {
        "AUXPORT" => Ok(1),
        "FIRSTPORTA" | "PORT0" => Ok(10),
        "FIRSTPORTB" | "PORT1" => Ok(11),
        "FIRSTPORTCL" => Ok(12),
        "FIRSTPORTCH" => Ok(13),
        "SECONDPORTA" | "PORT2" => Ok(14),
        "SECONDPORTB" | "PORT3" => Ok(15),
        _ => Err(HardwareError::UnknownPort(name.to_string())),
    }
}

/// Opens `device` (product name or unique id; falls back to the first device
/// found) and configures `port` for output.
pub fn open_daq(device: &str, port: &str) -> Result<Box<dyn DigitalOutput>, HardwareError> {
    let port = port_type(port)?;
    #[cfg(feature = "mcc-daq")]
    {
        uldaq::MccDigitalOutput::open(device, port).map(|d| Box::new(d) as Box<dyn DigitalOutput>)
    }
    #[cfg(not(feature = "mcc-daq"))]
    {
        let _ = (device, port);
        Err(HardwareError::NotCompiled("DAQ"))
    }
}

#[cfg(feature = "mcc-daq")]
mod uldaq {
    use std::ffi::CStr;

    use tracing::{info, warn};

    use crate::pulse::DigitalOutput;
    use crate::status::HardwareError;

    type CChar = libc::c_char;
    type CInt = libc::c_int;
    type CUint = libc::c_uint;
    type CUlonglong = libc::c_ulonglong;
    type DaqDeviceHandle = libc::c_longlong;
    type UlError = CInt;

    const ERR_NO_ERROR: UlError = 0;
    const ANY_IFC: CInt = 7;
    const DD_OUTPUT: CInt = 2;
    const MAX_DEVICES: usize = 16;
    const ERR_MSG_LEN: usize = 512;

    #[repr(C)]
    #[derive(Clone, Copy)]
    struct DaqDeviceDescriptor {
        product_name: [CChar; 64],
        product_id: CUint,
        dev_interface: CInt,
        dev_string: [CChar; 64],
        unique_id: [CChar; 64],
        reserved: [CChar; 512],
    }

    impl DaqDeviceDescriptor {
        fn zeroed() -> Self {
            Self {
                product_name: [0; 64],
                product_id: 0,
                dev_interface: 0,
                dev_string: [0; 64],
                unique_id: [0; 64],
                reserved: [0; 512],
            }
        }

        fn product_name(&self) -> String {
            unsafe { CStr::from_ptr(self.product_name.as_ptr()) }
                .to_string_lossy()
                .into_owned()
        }

        fn unique_id(&self) -> String {
            unsafe { CStr::from_ptr(self.unique_id.as_ptr()) }
                .to_string_lossy()
                .into_owned()
        }
    }

    #[link(name = "uldaq")]
    extern "C" {
        fn ulGetDaqDeviceInventory(
            interfaceTypes: CInt,
            daqDevDescriptors: *mut DaqDeviceDescriptor,
            numDescriptors: *mut CUint,
        ) -> UlError;
        fn ulCreateDaqDevice(daqDevDescriptor: DaqDeviceDescriptor) -> DaqDeviceHandle;
        fn ulConnectDaqDevice(daqDeviceHandle: DaqDeviceHandle) -> UlError;
        fn ulDisconnectDaqDevice(daqDeviceHandle: DaqDeviceHandle) -> UlError;
        fn ulReleaseDaqDevice(daqDeviceHandle: DaqDeviceHandle) -> UlError;
        fn ulDConfigPort(
            daqDeviceHandle: DaqDeviceHandle,
            portType: CInt,
            direction: CInt,
        ) -> UlError;
        fn ulDOut(daqDeviceHandle: DaqDeviceHandle, portType: CInt, data: CUlonglong) -> UlError;
        fn ulGetErrMsg(errCode: UlError, errMsg: *mut CChar) -> UlError;
    }

    /// Runs a `uldaq` call and maps a non-zero return to [`HardwareError`].
    fn ul_call<F>(what: &str, func: F) -> Result<(), HardwareError>
    where
        F: FnOnce() -> UlError,
    {
        let err = func();
        if err == ERR_NO_ERROR {
            return Ok(());
        }
        let mut buf = [0 as CChar; ERR_MSG_LEN];
        let msg = unsafe {
            ulGetErrMsg(err, buf.as_mut_ptr());
            CStr::from_ptr(buf.as_ptr()).to_string_lossy().into_owned()
        };
        Err(HardwareError::Device(format!("{what} failed ({err}): {msg}")))
    }

    pub struct MccDigitalOutput {
        handle: DaqDeviceHandle,
        port: CInt,
        name: String,
        connected: bool,
    }

    impl MccDigitalOutput {
        pub fn open(device: &str, port: CInt) -> Result<Self, HardwareError> {
            let mut descriptors = [DaqDeviceDescriptor::zeroed(); MAX_DEVICES];
            let mut count = MAX_DEVICES as CUint;
            ul_call("device inventory", || unsafe {
                ulGetDaqDeviceInventory(ANY_IFC, descriptors.as_mut_ptr(), &mut count)
            })?;
            let found = &descriptors[..(count as usize).min(MAX_DEVICES)];
            if found.is_empty() {
                return Err(HardwareError::NotFound("DAQ device"));
            }
            for d in found {
                info!(product = %d.product_name(), id = %d.unique_id(), "found DAQ device");
            }
            let descriptor = found
                .iter()
                .find(|d| d.product_name() == device || d.unique_id() == device)
                .unwrap_or_else(|| {
                    warn!(requested = device, "DAQ device not matched, using the first one");
                    &found[0]
                });

            let handle = unsafe { ulCreateDaqDevice(*descriptor) };
            if handle == 0 {
                return Err(HardwareError::Device("could not create DAQ device".into()));
            }
            let mut output = Self {
                handle,
                port,
                name: descriptor.product_name(),
                connected: false,
            };
            ul_call("connect", || unsafe { ulConnectDaqDevice(handle) })?;
            output.connected = true;
            ul_call("configure port", || unsafe {
                ulDConfigPort(handle, port, DD_OUTPUT)
            })?;
            Ok(output)
        }
    }

    impl DigitalOutput for MccDigitalOutput {
        fn name(&self) -> String {
            self.name.clone()
        }

        fn write(&mut self, value: u8) -> Result<(), HardwareError> {
            let (handle, port) = (self.handle, self.port);
            ul_call("digital out", || unsafe {
                ulDOut(handle, port, value as CUlonglong)
            })
        }

        fn close(&mut self) {
            if self.handle == 0 {
                return;
            }
            unsafe {
                if self.connected {
                    ulDisconnectDaqDevice(self.handle);
                }
                ulReleaseDaqDevice(self.handle);
            }
            self.handle = 0;
            self.connected = false;
        }
    }

    impl Drop for MccDigitalOutput {
        fn drop(&mut self) {
            self.close()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_names() {
        assert_eq!(port_type("FIRSTPORTA"), Ok(10));
        assert_eq!(port_type("port0"), Ok(10));
        assert_eq!(port_type(" auxport "), Ok(1));
        assert!(matches!(
            port_type("port9"),
            Err(HardwareError::UnknownPort(_))
        ));
    }

    #[cfg(not(feature = "mcc-daq"))]
    #[test]
    fn unavailable_without_backend() {
        assert!(matches!(
            open_daq("Dev1", "port0"),
            Err(HardwareError::NotCompiled("DAQ"))
        ));
    }
}
