//! OpenTherm application messages
//!
//! An OpenTherm frame is a 32-bit word:
//!
//! ```text
//!  31  30..28  27..24  23..16   15..8     7..0
//! ┌───┬──────┬───────┬───────┬─────────┬─────────┐
//! │ P │ TYPE │ spare │  ID   │ VALUE HB│ VALUE LB│
//! └───┴──────┴───────┴───────┴─────────┴─────────┘
//! ```
//!
//! `P` is chosen so the whole word has an even number of set bits.

/// Bit forced on to give the word even parity
pub const PARITY_BIT: u32 = 0x8000_0000;

/// Returns true if `word` has an even number of set bits
pub fn check_parity(word: u32) -> bool {
    word.count_ones() % 2 == 0
}

/// Recompute bit 31 so `word` has even parity
///
/// Any parity bit already present in `word` is discarded first.
pub fn with_parity(word: u32) -> u32 {
    let data = word & !PARITY_BIT;
    if check_parity(data) {
        data
    } else {
        data | PARITY_BIT
    }
}

/// OpenTherm message type (3 bits)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum MessageType {
    ReadData = 0,
    WriteData = 1,
    InvalidData = 2,
    Reserved = 3,
    ReadAck = 4,
    WriteAck = 5,
    DataInvalid = 6,
    UnknownDataId = 7,
}

impl MessageType {
    /// Decode from the low three bits of `bits`
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x7 {
            0 => MessageType::ReadData,
            1 => MessageType::WriteData,
            2 => MessageType::InvalidData,
            3 => MessageType::Reserved,
            4 => MessageType::ReadAck,
            5 => MessageType::WriteAck,
            6 => MessageType::DataInvalid,
            _ => MessageType::UnknownDataId,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Slave-to-master types carry a response from the boiler
    pub fn is_response(self) -> bool {
        self.as_u8() >= 4
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MessageType::ReadData => "READ_DATA",
            MessageType::WriteData => "WRITE_DATA",
            MessageType::InvalidData => "INVALID_DATA",
            MessageType::Reserved => "RESERVED",
            MessageType::ReadAck => "READ_ACK",
            MessageType::WriteAck => "WRITE_ACK",
            MessageType::DataInvalid => "DATA_INVALID",
            MessageType::UnknownDataId => "UNKNOWN_DATAID",
        }
    }
}

macro_rules! message_ids {
    ($($variant:ident = $value:literal => $name:literal,)*) => {
        /// Well-known OpenTherm data ids
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        #[repr(u8)]
        pub enum MessageId {
            $($variant = $value,)*
        }

        impl MessageId {
            /// Look up a data id, `None` for ids without a name
            pub fn from_u8(value: u8) -> Option<Self> {
                match value {
                    $($value => Some(MessageId::$variant),)*
                    _ => None,
                }
            }

            pub fn as_str(self) -> &'static str {
                match self {
                    $(MessageId::$variant => $name,)*
                }
            }
        }
    };
}

message_ids! {
    Status = 0 => "STATUS",
    ChSetpoint = 1 => "CH_SETPOINT",
    ControllerConfig = 2 => "CONTROLLER_CONFIG",
    DeviceConfig = 3 => "DEVICE_CONFIG",
    CommandCode = 4 => "COMMAND_CODE",
    FaultFlags = 5 => "FAULT_FLAGS",
    Remote = 6 => "REMOTE",
    CoolingControl = 7 => "COOLING_CONTROL",
    Ch2Setpoint = 8 => "CH2_SETPOINT",
    ChSetpointOverride = 9 => "CH_SETPOINT_OVERRIDE",
    TspCount = 10 => "TSP_COUNT",
    TspCommand = 11 => "TSP_COMMAND",
    FhbSize = 12 => "FHB_SIZE",
    FhbCommand = 13 => "FHB_COMMAND",
    MaxModulationLevel = 14 => "MAX_MODULATION_LEVEL",
    MaxBoilerCapacity = 15 => "MAX_BOILER_CAPACITY",
    RoomSetpoint = 16 => "ROOM_SETPOINT",
    ModulationLevel = 17 => "MODULATION_LEVEL",
    ChWaterPressure = 18 => "CH_WATER_PRESSURE",
    DhwFlowRate = 19 => "DHW_FLOW_RATE",
    DayTime = 20 => "DAY_TIME",
    Date = 21 => "DATE",
    Year = 22 => "YEAR",
    RoomSetpointCh2 = 23 => "ROOM_SETPOINT_CH2",
    RoomTemp = 24 => "ROOM_TEMP",
    FeedTemp = 25 => "FEED_TEMP",
    DhwTemp = 26 => "DHW_TEMP",
    OutsideTemp = 27 => "OUTSIDE_TEMP",
    ReturnWaterTemp = 28 => "RETURN_WATER_TEMP",
    SolarStoreTemp = 29 => "SOLAR_STORE_TEMP",
    SolarCollectTemp = 30 => "SOLAR_COLLECT_TEMP",
    FeedTempCh2 = 31 => "FEED_TEMP_CH2",
    Dhw2Temp = 32 => "DHW2_TEMP",
    ExhaustTemp = 33 => "EXHAUST_TEMP",
    FanSpeed = 35 => "FAN_SPEED",
    FlameCurrent = 36 => "FLAME_CURRENT",
    RoomTempCh2 = 37 => "ROOM_TEMP_CH2",
    RelHumidity = 38 => "REL_HUMIDITY",
    DhwBounds = 48 => "DHW_BOUNDS",
    ChBounds = 49 => "CH_BOUNDS",
    OtcCurveBounds = 50 => "OTC_CURVE_BOUNDS",
    DhwSetpoint = 56 => "DHW_SETPOINT",
    MaxChSetpoint = 57 => "MAX_CH_SETPOINT",
    OtcCurveRatio = 58 => "OTC_CURVE_RATIO",
    HvacStatus = 70 => "HVAC_STATUS",
    RelVentSetpoint = 71 => "REL_VENT_SETPOINT",
    DeviceVent = 74 => "DEVICE_VENT",
    HvacVerId = 75 => "HVAC_VER_ID",
    RelVentilation = 77 => "REL_VENTILATION",
    RelHumidExhaust = 78 => "REL_HUMID_EXHAUST",
    ExhaustCo2 = 79 => "EXHAUST_CO2",
    SupplyInletTemp = 80 => "SUPPLY_INLET_TEMP",
    SupplyOutletTemp = 81 => "SUPPLY_OUTLET_TEMP",
    ExhaustInletTemp = 82 => "EXHAUST_INLET_TEMP",
    ExhaustOutletTemp = 83 => "EXHAUST_OUTLET_TEMP",
    ExhaustFanSpeed = 84 => "EXHAUST_FAN_SPEED",
    SupplyFanSpeed = 85 => "SUPPLY_FAN_SPEED",
    RemoteVentilationParam = 86 => "REMOTE_VENTILATION_PARAM",
    NomRelVentilation = 87 => "NOM_REL_VENTILATION",
    HvacNumTsp = 88 => "HVAC_NUM_TSP",
    HvacIdxTsp = 89 => "HVAC_IDX_TSP",
    HvacFhbSize = 90 => "HVAC_FHB_SIZE",
    HvacFhbIdx = 91 => "HVAC_FHB_IDX",
    RfSignal = 98 => "RF_SIGNAL",
    DhwMode = 99 => "DHW_MODE",
    OverrideFunc = 100 => "OVERRIDE_FUNC",
    SolarModeFlags = 101 => "SOLAR_MODE_FLAGS",
    SolarAsf = 102 => "SOLAR_ASF",
    SolarVersionId = 103 => "SOLAR_VERSION_ID",
    SolarProductId = 104 => "SOLAR_PRODUCT_ID",
    SolarNumTsp = 105 => "SOLAR_NUM_TSP",
    SolarIdxTsp = 106 => "SOLAR_IDX_TSP",
    SolarFhbSize = 107 => "SOLAR_FHB_SIZE",
    SolarFhbIdx = 108 => "SOLAR_FHB_IDX",
    SolarStarts = 109 => "SOLAR_STARTS",
    SolarHours = 110 => "SOLAR_HOURS",
    SolarEnergy = 111 => "SOLAR_ENERGY",
    SolarTotalEnergy = 112 => "SOLAR_TOTAL_ENERGY",
    FailedBurnerStarts = 113 => "FAILED_BURNER_STARTS",
    BurnerFlameLow = 114 => "BURNER_FLAME_LOW",
    OemDiagnostic = 115 => "OEM_DIAGNOSTIC",
    BurnerStarts = 116 => "BURNER_STARTS",
    ChPumpStarts = 117 => "CH_PUMP_STARTS",
    DhwPumpStarts = 118 => "DHW_PUMP_STARTS",
    DhwBurnerStarts = 119 => "DHW_BURNER_STARTS",
    BurnerHours = 120 => "BURNER_HOURS",
    ChPumpHours = 121 => "CH_PUMP_HOURS",
    DhwPumpHours = 122 => "DHW_PUMP_HOURS",
    DhwBurnerHours = 123 => "DHW_BURNER_HOURS",
    OtVersionController = 124 => "OT_VERSION_CONTROLLER",
    OtVersionDevice = 125 => "OT_VERSION_DEVICE",
    VersionController = 126 => "VERSION_CONTROLLER",
    VersionDevice = 127 => "VERSION_DEVICE",
}

impl MessageId {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// One OpenTherm request or response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OpenThermMessage {
    /// Message type, only the low three bits are transmitted
    pub msg_type: u8,
    /// Data id
    pub id: u8,
    pub value_hb: u8,
    pub value_lb: u8,
}

impl OpenThermMessage {
    pub fn new(msg_type: MessageType, id: u8, value: u16) -> Self {
        let [value_hb, value_lb] = value.to_be_bytes();
        Self {
            msg_type: msg_type.as_u8(),
            id,
            value_hb,
            value_lb,
        }
    }

    /// READ_DATA request for `id`
    pub fn read(id: MessageId) -> Self {
        Self::new(MessageType::ReadData, id.as_u8(), 0)
    }

    /// WRITE_DATA request carrying an unsigned value
    pub fn write_u16(id: MessageId, value: u16) -> Self {
        Self::new(MessageType::WriteData, id.as_u8(), value)
    }

    /// WRITE_DATA request carrying an 8.8 fixed-point value
    pub fn write_f88(id: MessageId, value: f32) -> Self {
        let mut msg = Self::new(MessageType::WriteData, id.as_u8(), 0);
        msg.set_f88(value);
        msg
    }

    /// Pack into a 32-bit word with even parity
    pub fn to_word(&self) -> u32 {
        let word = ((self.msg_type as u32 & 0x7) << 28)
            | ((self.id as u32) << 16)
            | ((self.value_hb as u32) << 8)
            | self.value_lb as u32;
        with_parity(word)
    }

    /// Unpack a 32-bit word, ignoring parity and spare bits
    pub fn from_word(word: u32) -> Self {
        Self {
            msg_type: ((word >> 28) & 0x7) as u8,
            id: (word >> 16) as u8,
            value_hb: (word >> 8) as u8,
            value_lb: word as u8,
        }
    }

    pub fn message_type(&self) -> MessageType {
        MessageType::from_bits(self.msg_type)
    }

    /// Named data id, if known
    pub fn message_id(&self) -> Option<MessageId> {
        MessageId::from_u8(self.id)
    }

    pub fn u16(&self) -> u16 {
        u16::from_be_bytes([self.value_hb, self.value_lb])
    }

    pub fn set_u16(&mut self, value: u16) {
        [self.value_hb, self.value_lb] = value.to_be_bytes();
    }

    pub fn s16(&self) -> i16 {
        i16::from_be_bytes([self.value_hb, self.value_lb])
    }

    pub fn set_s16(&mut self, value: i16) {
        [self.value_hb, self.value_lb] = value.to_be_bytes();
    }

    /// Signed 8.8 fixed point
    pub fn f88(&self) -> f32 {
        self.s16() as f32 / 256.0
    }

    pub fn set_f88(&mut self, value: f32) {
        self.set_s16((value * 256.0) as i16);
    }
}

/// How a sensor interprets the value bytes of a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ValueKind {
    U8Lb,
    U8Hb,
    S8Lb,
    S8Hb,
    /// Low byte in minutes, reported in seconds
    U8Lb60,
    /// High byte in minutes, reported in seconds
    U8Hb60,
    U16,
    S16,
    F88,
}

impl ValueKind {
    /// Parse a sensor `data_type` name such as `"f88"` or `"u8_lb"`
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "u8_lb" => Some(ValueKind::U8Lb),
            "u8_hb" => Some(ValueKind::U8Hb),
            "s8_lb" => Some(ValueKind::S8Lb),
            "s8_hb" => Some(ValueKind::S8Hb),
            "u8_lb_60" => Some(ValueKind::U8Lb60),
            "u8_hb_60" => Some(ValueKind::U8Hb60),
            "u16" => Some(ValueKind::U16),
            "s16" => Some(ValueKind::S16),
            "f88" => Some(ValueKind::F88),
            _ => None,
        }
    }

    pub fn read(self, msg: &OpenThermMessage) -> f32 {
        match self {
            ValueKind::U8Lb => msg.value_lb as f32,
            ValueKind::U8Hb => msg.value_hb as f32,
            ValueKind::S8Lb => msg.value_lb as i8 as f32,
            ValueKind::S8Hb => msg.value_hb as i8 as f32,
            ValueKind::U8Lb60 => msg.value_lb as f32 * 60.0,
            ValueKind::U8Hb60 => msg.value_hb as f32 * 60.0,
            ValueKind::U16 => msg.u16() as f32,
            ValueKind::S16 => msg.s16() as f32,
            ValueKind::F88 => msg.f88(),
        }
    }
}
