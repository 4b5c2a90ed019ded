//! Error types for UL operations.
//!
//! [`UlError`] is the closed set of error codes exposed by the public API.
//! Internally every fallible call returns [`Result<T>`] and failures propagate
//! with `?`; the [`crate::api`] boundary converts the final result into a
//! numeric code. The `#[error(...)]` strings double as the message table
//! returned by [`err_msg`].

use thiserror::Error;

/// Result type alias for UL operations.
pub type Result<T> = std::result::Result<T, UlError>;

/// Every error code the library can report.
///
/// Discriminants match the public numeric codes and never change.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum UlError {
    #[error("No error has occurred")]
    NoError = 0,
    #[error("Unhandled internal exception")]
    UnhandledException = 1,
    #[error("Invalid device handle")]
    BadDevHandle = 2,
    #[error("This function cannot be used with this device")]
    BadDevType = 3,
    #[error("Insufficient permission to access this device")]
    UsbDevNoPermission = 4,
    #[error("USB interface is already claimed")]
    UsbInterfaceClaimed = 5,
    #[error("Device not found")]
    DevNotFound = 6,
    #[error("Device not connected or connection lost")]
    DevNotConnected = 7,
    #[error("Device no longer responding")]
    DeadDev = 8,
    #[error("Buffer too small for operation")]
    BadBufferSize = 9,
    #[error("Invalid buffer")]
    BadBuffer = 10,
    #[error("Invalid memory type")]
    BadMemType = 11,
    #[error("Invalid memory region")]
    BadMemRegion = 12,
    #[error("Invalid range")]
    BadRange = 13,
    #[error("Invalid analog input channel specified")]
    BadAiChan = 14,
    #[error("Invalid input mode specified")]
    BadInputMode = 15,
    #[error("A background process is already in progress")]
    AlreadyActive = 16,
    #[error("Invalid trigger type specified")]
    BadTrigType = 17,
    #[error("FIFO overrun, data was not transferred from device fast enough")]
    Overrun = 18,
    #[error("FIFO underrun, data was not transferred to device fast enough")]
    Underrun = 19,
    #[error("Operation timed out")]
    TimedOut = 20,
    #[error("Invalid option specified")]
    BadOption = 21,
    #[error("Invalid sampling rate specified")]
    BadRate = 22,
    #[error("Sample count cannot be greater than FIFO size for BURSTIO scans")]
    BadBurstIoCount = 23,
    #[error("Configuration not supported")]
    ConfigNotSupported = 24,
    #[error("Invalid configuration value")]
    BadConfigVal = 25,
    #[error("Invalid analog input channel type specified")]
    BadAiChanType = 26,
    #[error("ADC overrun occurred")]
    AdcOverrun = 27,
    #[error("Invalid thermocouple type specified")]
    BadTcType = 28,
    #[error("Invalid unit specified")]
    BadUnit = 29,
    #[error("Invalid queue size")]
    BadQueueSize = 30,
    #[error("Invalid config item specified")]
    BadConfigItem = 31,
    #[error("Invalid info item specified")]
    BadInfoItem = 32,
    #[error("Invalid flag specified")]
    BadFlag = 33,
    #[error("Invalid sample count specified")]
    BadSampleCount = 34,
    #[error("Internal error")]
    Internal = 35,
    #[error("Invalid coupling mode")]
    BadCouplingMode = 36,
    #[error("Invalid sensor sensitivity")]
    BadSensorSensitivity = 37,
    #[error("Invalid IEPE mode")]
    BadIepeMode = 38,
    #[error("Invalid channel queue specified")]
    BadAiChanQueue = 39,
    #[error("Invalid gain queue specified")]
    BadAiGainQueue = 40,
    #[error("Invalid mode queue specified")]
    BadAiModeQueue = 41,
    #[error("FPGA file not found")]
    FpgaFileNotFound = 42,
    #[error("Unable to read FPGA file")]
    UnableToReadFpgaFile = 43,
    #[error("FPGA not loaded")]
    NoFpga = 44,
    #[error("Invalid argument")]
    BadArg = 45,
    #[error("Minimum slope value reached")]
    MinSlopeValReached = 46,
    #[error("Maximum slope value reached")]
    MaxSlopeValReached = 47,
    #[error("Minimum offset value reached")]
    MinOffsetValReached = 48,
    #[error("Maximum offset value reached")]
    MaxOffsetValReached = 49,
    #[error("Invalid port type specified")]
    BadPortType = 50,
    #[error("Digital I/O is configured incorrectly")]
    WrongDigConfig = 51,
    #[error("Invalid bit number")]
    BadBitNum = 52,
    #[error("Invalid port value specified")]
    BadPortVal = 53,
    #[error("Invalid re-trigger count")]
    BadRetrigCount = 54,
    #[error("Invalid analog output channel specified")]
    BadAoChan = 55,
    #[error("Invalid D/A output value specified")]
    BadDaVal = 56,
    #[error("Invalid timer specified")]
    BadTmr = 57,
    #[error("Invalid frequency specified")]
    BadFrequency = 58,
    #[error("Invalid duty cycle specified")]
    BadDutyCycle = 59,
    #[error("Invalid initial delay specified")]
    BadInitialDelay = 60,
    #[error("Invalid counter specified")]
    BadCtr = 61,
    #[error("Invalid counter value specified")]
    BadCtrVal = 62,
    #[error("Invalid DAQ input channel type specified")]
    BadDaqiChanType = 63,
    #[error("Invalid number of channels specified")]
    BadNumChans = 64,
    #[error("Invalid counter register specified")]
    BadCtrReg = 65,
    #[error("Invalid counter measurement type specified")]
    BadCtrMeasureType = 66,
    #[error("Invalid counter measurement mode specified")]
    BadCtrMeasureMode = 67,
    #[error("Invalid debounce time specified")]
    BadDebounceTime = 68,
    #[error("Invalid debounce mode specified")]
    BadDebounceMode = 69,
    #[error("Invalid edge detection mode specified")]
    BadEdgeDetection = 70,
    #[error("Invalid tick size specified")]
    BadTickSize = 71,
    #[error("Invalid DAQ output channel type specified")]
    BadDaqoChanType = 72,
    #[error("No connection established")]
    NoConnectionEstablished = 73,
    #[error("Invalid event type specified")]
    BadEventType = 74,
    #[error("An event handler has already been enabled for this event type")]
    EventAlreadyEnabled = 75,
    #[error("Invalid event parameter specified")]
    BadEventParameter = 76,
    #[error("Invalid callback function specified")]
    BadCallbackFunction = 77,
    #[error("Invalid memory address")]
    BadMemAddress = 78,
    #[error("Memory access denied")]
    MemAccessDenied = 79,
    #[error("Device is not available at time of request")]
    DevUnavailable = 80,
    #[error("Re-trigger option is not supported for the specified trigger type")]
    BadRetrigTrigType = 81,
    #[error("This function cannot be used with this version of the device")]
    BadDevVer = 82,
    #[error("This digital operation is not supported on the specified port")]
    BadDigOperation = 83,
    #[error("Invalid digital port index specified")]
    BadPortIndex = 84,
    #[error("Temperature input has open connection")]
    OpenConnection = 85,
    #[error("Device is not ready to send data")]
    DevNotReady = 86,
    #[error("Pacer overrun, external clock rate too fast")]
    PacerOverrun = 87,
    #[error("Invalid trigger channel specified")]
    BadTrigChannel = 88,
    #[error("Invalid trigger level specified")]
    BadTrigLevel = 89,
    #[error("Invalid channel order")]
    BadChanOrder = 90,
    #[error("Temperature input is out of range")]
    TempOutOfRange = 91,
    #[error("Trigger threshold is out of range")]
    TrigThresholdOutOfRange = 92,
    #[error("Incompatible firmware version, firmware update required")]
    IncompatibleFirmware = 93,
    #[error("Specified network interface is not available or disconnected")]
    BadNetIfc = 94,
    #[error("Invalid host specified")]
    BadNetHost = 95,
    #[error("Invalid port specified")]
    BadNetPort = 96,
    #[error("Network interface used to obtain the device descriptor not available or disconnected")]
    NetIfcUnavailable = 97,
    #[error("Network connection failed")]
    NetConnectionFailed = 98,
    #[error("Invalid connection code")]
    BadConnectionCode = 99,
    #[error("Connection code ignored")]
    ConnectionCodeIgnored = 100,
    #[error("Network device already in use")]
    NetDevInUse = 101,
    #[error("Invalid network frame")]
    BadNetFrame = 102,
    #[error("Network device did not respond within expected time")]
    NetTimeout = 103,
    #[error("Network device data socket connection failed")]
    DataSocketConnectionFailed = 104,
    #[error("One or more bits on the specified port are used for alarm")]
    PortUsedForAlarm = 105,
    #[error("The specified bit is used for alarm")]
    BitUsedForAlarm = 106,
    #[error("Common-mode voltage range exceeded")]
    CmrExceeded = 107,
    #[error("Network buffer overrun, data was not transferred from buffer fast enough")]
    NetBufferOverrun = 108,
    #[error("Invalid network buffer")]
    BadNetBuffer = 109,
}

/// Message returned for codes outside the table.
const UNKNOWN_ERROR_MSG: &str = "Unknown error code";

impl UlError {
    /// Every code in ascending numeric order.
    pub const ALL: [UlError; 110] = [
        Self::NoError,
        Self::UnhandledException,
        Self::BadDevHandle,
        Self::BadDevType,
        Self::UsbDevNoPermission,
        Self::UsbInterfaceClaimed,
        Self::DevNotFound,
        Self::DevNotConnected,
        Self::DeadDev,
        Self::BadBufferSize,
        Self::BadBuffer,
        Self::BadMemType,
        Self::BadMemRegion,
        Self::BadRange,
        Self::BadAiChan,
        Self::BadInputMode,
        Self::AlreadyActive,
        Self::BadTrigType,
        Self::Overrun,
        Self::Underrun,
        Self::TimedOut,
        Self::BadOption,
        Self::BadRate,
        Self::BadBurstIoCount,
        Self::ConfigNotSupported,
        Self::BadConfigVal,
        Self::BadAiChanType,
        Self::AdcOverrun,
        Self::BadTcType,
        Self::BadUnit,
        Self::BadQueueSize,
        Self::BadConfigItem,
        Self::BadInfoItem,
        Self::BadFlag,
        Self::BadSampleCount,
        Self::Internal,
        Self::BadCouplingMode,
        Self::BadSensorSensitivity,
        Self::BadIepeMode,
        Self::BadAiChanQueue,
        Self::BadAiGainQueue,
        Self::BadAiModeQueue,
        Self::FpgaFileNotFound,
        Self::UnableToReadFpgaFile,
        Self::NoFpga,
        Self::BadArg,
        Self::MinSlopeValReached,
        Self::MaxSlopeValReached,
        Self::MinOffsetValReached,
        Self::MaxOffsetValReached,
        Self::BadPortType,
        Self::WrongDigConfig,
        Self::BadBitNum,
        Self::BadPortVal,
        Self::BadRetrigCount,
        Self::BadAoChan,
        Self::BadDaVal,
        Self::BadTmr,
        Self::BadFrequency,
        Self::BadDutyCycle,
        Self::BadInitialDelay,
        Self::BadCtr,
        Self::BadCtrVal,
        Self::BadDaqiChanType,
        Self::BadNumChans,
        Self::BadCtrReg,
        Self::BadCtrMeasureType,
        Self::BadCtrMeasureMode,
        Self::BadDebounceTime,
        Self::BadDebounceMode,
        Self::BadEdgeDetection,
        Self::BadTickSize,
        Self::BadDaqoChanType,
        Self::NoConnectionEstablished,
        Self::BadEventType,
        Self::EventAlreadyEnabled,
        Self::BadEventParameter,
        Self::BadCallbackFunction,
        Self::BadMemAddress,
        Self::MemAccessDenied,
        Self::DevUnavailable,
        Self::BadRetrigTrigType,
        Self::BadDevVer,
        Self::BadDigOperation,
        Self::BadPortIndex,
        Self::OpenConnection,
        Self::DevNotReady,
        Self::PacerOverrun,
        Self::BadTrigChannel,
        Self::BadTrigLevel,
        Self::BadChanOrder,
        Self::TempOutOfRange,
        Self::TrigThresholdOutOfRange,
        Self::IncompatibleFirmware,
        Self::BadNetIfc,
        Self::BadNetHost,
        Self::BadNetPort,
        Self::NetIfcUnavailable,
        Self::NetConnectionFailed,
        Self::BadConnectionCode,
        Self::ConnectionCodeIgnored,
        Self::NetDevInUse,
        Self::BadNetFrame,
        Self::NetTimeout,
        Self::DataSocketConnectionFailed,
        Self::PortUsedForAlarm,
        Self::BitUsedForAlarm,
        Self::CmrExceeded,
        Self::NetBufferOverrun,
        Self::BadNetBuffer,
    ];

    /// Numeric code as exposed by the public API.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Look up an error by its numeric code.
    pub fn from_code(code: i32) -> Option<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
    }

    /// True for `ERR_NO_ERROR`.
    pub fn is_ok(self) -> bool {
        self == Self::NoError
    }

    /// Errors caused by invalid caller arguments.
    pub fn is_argument_error(self) -> bool {
        matches!(
            self,
            Self::BadBufferSize
                | Self::BadBuffer
                | Self::BadMemType
                | Self::BadMemRegion
                | Self::BadRange
                | Self::BadAiChan
                | Self::BadInputMode
                | Self::BadTrigType
                | Self::BadOption
                | Self::BadRate
                | Self::BadBurstIoCount
                | Self::BadConfigVal
                | Self::BadAiChanType
                | Self::BadTcType
                | Self::BadUnit
                | Self::BadQueueSize
                | Self::BadConfigItem
                | Self::BadInfoItem
                | Self::BadFlag
                | Self::BadSampleCount
                | Self::BadAiChanQueue
                | Self::BadAiGainQueue
                | Self::BadAiModeQueue
                | Self::BadArg
                | Self::BadPortType
                | Self::BadBitNum
                | Self::BadPortVal
                | Self::BadRetrigCount
                | Self::BadAoChan
                | Self::BadDaVal
                | Self::BadTmr
                | Self::BadFrequency
                | Self::BadDutyCycle
                | Self::BadInitialDelay
                | Self::BadCtr
                | Self::BadCtrVal
                | Self::BadDaqiChanType
                | Self::BadNumChans
                | Self::BadCtrReg
                | Self::BadCtrMeasureType
                | Self::BadCtrMeasureMode
                | Self::BadDebounceTime
                | Self::BadDebounceMode
                | Self::BadEdgeDetection
                | Self::BadTickSize
                | Self::BadDaqoChanType
                | Self::BadEventType
                | Self::BadEventParameter
                | Self::BadCallbackFunction
                | Self::BadMemAddress
                | Self::BadRetrigTrigType
                | Self::BadDigOperation
                | Self::BadPortIndex
                | Self::BadTrigChannel
                | Self::BadTrigLevel
                | Self::BadChanOrder
        )
    }

    /// Errors caused by the device or scan being in the wrong state.
    pub fn is_state_error(self) -> bool {
        matches!(
            self,
            Self::AlreadyActive
                | Self::NoConnectionEstablished
                | Self::DevNotConnected
                | Self::EventAlreadyEnabled
                | Self::WrongDigConfig
                | Self::DevNotReady
                | Self::DevUnavailable
        )
    }

    /// Errors raised by the transport layer.
    pub fn is_transport_error(self) -> bool {
        matches!(
            self,
            Self::TimedOut
                | Self::DeadDev
                | Self::UsbDevNoPermission
                | Self::UsbInterfaceClaimed
                | Self::DevNotFound
                | Self::NetTimeout
                | Self::NetConnectionFailed
        )
    }

    /// Errors reporting lost or corrupted scan data.
    pub fn is_data_integrity_error(self) -> bool {
        matches!(
            self,
            Self::Overrun
                | Self::Underrun
                | Self::AdcOverrun
                | Self::PacerOverrun
                | Self::NetBufferOverrun
        )
    }

    /// Errors reporting a sensor fault.
    pub fn is_sensor_fault(self) -> bool {
        matches!(
            self,
            Self::OpenConnection | Self::TempOutOfRange | Self::CmrExceeded
        )
    }
}

impl From<UlError> for i32 {
    fn from(err: UlError) -> Self {
        err.code()
    }
}

/// Human-readable message for a numeric error code.
pub fn err_msg(code: i32) -> &'static str {
    match UlError::from_code(code) {
        Some(err) => message(err),
        None => UNKNOWN_ERROR_MSG,
    }
}

fn message(err: UlError) -> &'static str {
    // Display output of a fieldless variant is its literal; keep the
    // static table in sync by deriving it once.
    use once_cell::sync::Lazy;

    static MESSAGES: Lazy<Vec<String>> =
        Lazy::new(|| UlError::ALL.iter().map(ToString::to_string).collect());

    MESSAGES
        .get(err.code() as usize)
        .map(String::as_str)
        .unwrap_or(UNKNOWN_ERROR_MSG)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_dense_and_ordered() {
        for (idx, err) in UlError::ALL.iter().enumerate() {
            assert_eq!(err.code(), idx as i32, "{:?}", err);
        }
    }

    #[test]
    fn test_from_code_round_trip() {
        assert_eq!(UlError::from_code(16), Some(UlError::AlreadyActive));
        assert_eq!(UlError::from_code(109), Some(UlError::BadNetBuffer));
        assert_eq!(UlError::from_code(110), None);
        assert_eq!(UlError::from_code(-1), None);
    }

    #[test]
    fn test_err_msg() {
        assert_eq!(err_msg(0), "No error has occurred");
        assert_eq!(err_msg(20), "Operation timed out");
        assert_eq!(
            err_msg(16),
            "A background process is already in progress"
        );
        assert_eq!(err_msg(5000), UNKNOWN_ERROR_MSG);
    }

    #[test]
    fn test_categories() {
        assert!(UlError::BadRate.is_argument_error());
        assert!(UlError::AlreadyActive.is_state_error());
        assert!(UlError::TimedOut.is_transport_error());
        assert!(UlError::Overrun.is_data_integrity_error());
        assert!(UlError::OpenConnection.is_sensor_fault());
        assert!(!UlError::Overrun.is_argument_error());
    }
}
