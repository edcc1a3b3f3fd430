//! Protocol commands
//!
//! Static catalog of the commands understood by the ventilation unit.
//! Each descriptor carries its opcode, the writers for its arguments and,
//! for queries, the response opcode with the readers for the reply fields.

use serde::Serialize;

use super::params::{Reader, Writer};

/// One argument of a command
#[derive(Debug, Clone, Copy)]
pub struct ArgSpec {
    /// Parameter key
    pub name: &'static str,
    /// Human readable label
    pub label: &'static str,
    /// Encoder for the value
    pub writer: Writer,
    /// Unit of the value, if any
    pub unit: Option<&'static str>,
}

/// One field of a response
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Field key in the decoded payload
    pub name: &'static str,
    /// Human readable label
    pub label: &'static str,
    /// Number of data bytes the field occupies
    pub length: usize,
    /// Decoder for the field bytes
    pub reader: Reader,
    /// Unit of the value, if any
    pub unit: Option<&'static str>,
}

/// A protocol operation
#[derive(Debug)]
pub struct CommandDescriptor {
    /// Stable identifier, e.g. `getTemperatures`
    pub name: &'static str,
    /// Human readable label
    pub label: &'static str,
    /// Opcode sent by the host
    pub opcode: [u8; 2],
    /// Opcode of the data reply, `None` for commands only acknowledged
    pub response: Option<[u8; 2]>,
    /// Arguments in wire order
    pub args: &'static [ArgSpec],
    /// Reply fields in wire order
    pub fields: &'static [FieldSpec],
}

impl CommandDescriptor {
    /// Check if this command expects a data response rather than a bare ACK
    pub fn expects_response(&self) -> bool {
        self.response.is_some()
    }

    /// Introspection view of the descriptor
    pub fn info(&self) -> CommandInfo {
        let arg: Vec<ParamInfo> = self
            .args
            .iter()
            .map(|a| ParamInfo {
                name: a.name,
                label: a.label,
                unit: a.unit,
            })
            .collect();
        let response: Vec<ParamInfo> = self
            .fields
            .iter()
            .map(|f| ParamInfo {
                name: f.name,
                label: f.label,
                unit: f.unit,
            })
            .collect();

        CommandInfo {
            name: self.name,
            label: self.label,
            arg: (!arg.is_empty()).then_some(arg),
            response: self.response.map(|_| response),
        }
    }
}

/// Serializable catalog entry, e.g. for building a UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandInfo {
    /// Command name
    pub name: &'static str,
    /// Human readable label
    pub label: &'static str,
    /// Arguments, omitted for commands without any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arg: Option<Vec<ParamInfo>>,
    /// Reply fields, omitted for ack-only commands
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Vec<ParamInfo>>,
}

/// Name and label of an argument or response field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParamInfo {
    /// Parameter or field key
    pub name: &'static str,
    /// Human readable label
    pub label: &'static str,
    /// Unit, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<&'static str>,
}

const fn arg(name: &'static str, label: &'static str, writer: Writer) -> ArgSpec {
    ArgSpec {
        name,
        label,
        writer,
        unit: None,
    }
}

const fn percent_arg(name: &'static str, label: &'static str) -> ArgSpec {
    ArgSpec {
        name,
        label,
        writer: Writer::LevelValue,
        unit: Some("%"),
    }
}

const fn field(name: &'static str, label: &'static str, length: usize, reader: Reader) -> FieldSpec {
    FieldSpec {
        name,
        label,
        length,
        reader,
        unit: None,
    }
}

const fn unit_field(
    name: &'static str,
    label: &'static str,
    length: usize,
    reader: Reader,
    unit: &'static str,
) -> FieldSpec {
    FieldSpec {
        name,
        label,
        length,
        reader,
        unit: Some(unit),
    }
}

const fn temperature(name: &'static str, label: &'static str) -> FieldSpec {
    unit_field(name, label, 1, Reader::Temperature, "°C")
}

const fn hours(name: &'static str, length: usize) -> FieldSpec {
    let reader = if length == 3 { Reader::U24 } else { Reader::U16 };
    unit_field(name, name, length, reader, "h")
}

const VERSION_FIELDS: &[FieldSpec] = &[
    field("major", "Version Major", 1, Reader::U8),
    field("minor", "Version Minor", 1, Reader::U8),
    field("beta", "Beta", 1, Reader::U8),
    field("deviceName", "Device name", 10, Reader::Text),
];

static COMMANDS: &[CommandDescriptor] = &[
    // Queries
    CommandDescriptor {
        name: "getBootloaderVersion",
        label: "Bootloader version",
        opcode: [0x00, 0x67],
        response: Some([0x00, 0x68]),
        args: &[],
        fields: VERSION_FIELDS,
    },
    CommandDescriptor {
        name: "getFirmwareVersion",
        label: "Firmware version",
        opcode: [0x00, 0x69],
        response: Some([0x00, 0x6A]),
        args: &[],
        fields: VERSION_FIELDS,
    },
    CommandDescriptor {
        name: "getFlapState",
        label: "Flap state",
        opcode: [0x00, 0x0D],
        response: Some([0x00, 0x0E]),
        args: &[],
        fields: &[
            unit_field("bypass", "Bypass", 1, Reader::Bypass, "%"),
            field("preheat", "Preheat", 1, Reader::Preheat),
            unit_field("bypassMotorCurrent", "Bypass motor current", 1, Reader::U8, "A"),
            unit_field("preheatMotorCurrent", "Preheat motor current", 1, Reader::U8, "A"),
        ],
    },
    CommandDescriptor {
        name: "getFanState",
        label: "Fan state",
        opcode: [0x00, 0x0B],
        response: Some([0x00, 0x0C]),
        args: &[],
        fields: &[
            unit_field("supplyAir", "Supply air", 1, Reader::U8, "%"),
            unit_field("outgoingAir", "Outgoing air", 1, Reader::U8, "%"),
            unit_field("rotationsSupply", "Rotations supply", 2, Reader::Rotation, "rpm"),
            unit_field("rotationsOutgoing", "Rotations outgoing", 2, Reader::Rotation, "rpm"),
        ],
    },
    CommandDescriptor {
        name: "getBypassControllerState",
        label: "Bypass controller state",
        opcode: [0x00, 0xDF],
        response: Some([0x00, 0xE0]),
        args: &[],
        fields: &[
            field("ignore", "ignore", 2, Reader::U16),
            field("bypassCoefficient", "Bypass coefficient", 1, Reader::U8),
            field("bypassLevel", "Bypass level", 1, Reader::U8),
            field("bypassAdjustment", "Bypass adjustment", 1, Reader::U8),
            field("summerMode", "Summer mode", 2, Reader::SummerMode),
        ],
    },
    CommandDescriptor {
        name: "getOperatingHours",
        label: "Operating hours",
        opcode: [0x00, 0xDD],
        response: Some([0x00, 0xDE]),
        args: &[],
        fields: &[
            hours("away", 3),
            hours("low", 3),
            hours("middle", 3),
            unit_field("frostProtection", "frost protection", 2, Reader::U16, "h"),
            unit_field("preHeating", "preheating", 2, Reader::U16, "h"),
            unit_field("bypassOpen", "bypass open", 2, Reader::U16, "h"),
            hours("filter", 2),
            hours("high", 3),
        ],
    },
    CommandDescriptor {
        name: "getVentilationLevel",
        label: "Ventilation levels",
        opcode: [0x00, 0xCD],
        response: Some([0x00, 0xCE]),
        args: &[],
        fields: &[
            unit_field("exhaustAway", "Exhaust fan level away", 1, Reader::U8, "%"),
            unit_field("exhaustLow", "Exhaust fan level low", 1, Reader::U8, "%"),
            unit_field("exhaustMiddle", "Exhaust fan level middle", 1, Reader::U8, "%"),
            unit_field("supplyAway", "Supply fan level away", 1, Reader::U8, "%"),
            unit_field("supplyLow", "Supply fan level low", 1, Reader::U8, "%"),
            unit_field("supplyMiddle", "Supply fan level middle", 1, Reader::U8, "%"),
            unit_field("exhaustCurrent", "Current exhaust fan level", 1, Reader::U8, "%"),
            unit_field("supplyCurrent", "Current supply fan level", 1, Reader::U8, "%"),
            field("currentLevel", "Current ventilation level", 1, Reader::U8),
            field("supplyFanRunning", "Supply fan is running", 1, Reader::Bool),
            unit_field("exhaustHigh", "Exhaust fan level high", 1, Reader::U8, "%"),
            unit_field("supplyHigh", "Supply fan level high", 1, Reader::U8, "%"),
        ],
    },
    CommandDescriptor {
        name: "getTemperatures",
        label: "Temperatures",
        opcode: [0x00, 0xD1],
        response: Some([0x00, 0xD2]),
        args: &[],
        fields: &[
            temperature("comfort", "comfort"),
            temperature("outsideAir", "outside air"),
            temperature("supplyAir", "supply air"),
            temperature("outgoingAir", "outgoing air"),
            temperature("exhaustAir", "exhaust air"),
            field("sensorConnected", "sensor connected", 1, Reader::SensorsConnected),
            temperature("groundHeatExchanger", "ground heat exchanger"),
            temperature("preheating", "preheating"),
            temperature("cookerHood", "cooker hood"),
        ],
    },
    CommandDescriptor {
        name: "getTemperatureStates",
        label: "Temperature states",
        opcode: [0x00, 0x0F],
        response: Some([0x00, 0x10]),
        args: &[],
        fields: &[
            temperature("outsideAir", "outside air"),
            temperature("supplyAir", "supply air"),
            temperature("outgoingAir", "outgoing air"),
            temperature("exhaustAir", "exhaust air"),
        ],
    },
    CommandDescriptor {
        name: "getFaults",
        label: "Operating faults",
        opcode: [0x00, 0xD9],
        response: Some([0x00, 0xDA]),
        args: &[],
        fields: &[
            field("currentErrorA", "current error A", 1, Reader::ErrorA),
            field("currentErrorE", "current error E", 1, Reader::ErrorCode),
            field("lastErrorA", "last error A", 1, Reader::ErrorA),
            field("lastErrorE", "last error E", 1, Reader::ErrorCode),
            field("penultimateErrorA", "penultimate error A", 1, Reader::ErrorA),
            field("penultimateErrorE", "penultimate error E", 1, Reader::ErrorCode),
            field("antepenultimateErrorA", "antepenultimate error A", 1, Reader::ErrorA),
            field("antepenultimateErrorE", "antepenultimate error E", 1, Reader::ErrorCode),
            field("replaceFilter", "replace filter", 1, Reader::FilterState),
            field("currentErrorEA", "current error EA", 1, Reader::ErrorCode),
            field("lastErrorEA", "last error EA", 1, Reader::ErrorCode),
            field("penultimateErrorEA", "penultimate error EA", 1, Reader::ErrorCode),
            field("antepenultimateErrorEA", "antepenultimate error EA", 1, Reader::ErrorCode),
            field("currentErrorAHigh", "current error A high", 1, Reader::ErrorCode),
            field("lastErrorAHigh", "last error A high", 1, Reader::ErrorCode),
            field("penultimateErrorAHigh", "penultimate error A high", 1, Reader::ErrorCode),
            field("antepenultimateErrorAHigh", "antepenultimate error A high", 1, Reader::ErrorCode),
        ],
    },
    // Settings, acknowledged only
    CommandDescriptor {
        name: "setLevel",
        label: "Set level",
        opcode: [0x00, 0x99],
        response: None,
        args: &[arg("level", "level", Writer::LevelEnum)],
        fields: &[],
    },
    CommandDescriptor {
        name: "setComfortTemperature",
        label: "Set comfort temperature",
        opcode: [0x00, 0xD3],
        response: None,
        args: &[ArgSpec {
            name: "temperature",
            label: "comfort temperature",
            writer: Writer::Temperature,
            unit: Some("°C"),
        }],
        fields: &[],
    },
    CommandDescriptor {
        name: "setVentilationLevel",
        label: "Set ventilation level",
        opcode: [0x00, 0xCF],
        response: None,
        args: &[
            percent_arg("exhaustAway", "exhaust away"),
            percent_arg("exhaustLow", "exhaust low"),
            percent_arg("exhaustMiddle", "exhaust middle"),
            percent_arg("exhaustHigh", "exhaust high"),
            percent_arg("supplyAway", "supply away"),
            percent_arg("supplyLow", "supply low"),
            percent_arg("supplyMiddle", "supply middle"),
            percent_arg("supplyHigh", "supply high"),
        ],
        fields: &[],
    },
    CommandDescriptor {
        name: "reset",
        label: "Reset and self test",
        opcode: [0x00, 0xDB],
        response: None,
        args: &[
            arg("resetFaults", "reset faults", Writer::Bool),
            arg("resetSettings", "reset settings", Writer::Bool),
            arg("runSelfTest", "run self test", Writer::Bool),
            arg("resetFilterTimer", "reset filter operating hours", Writer::Bool),
        ],
        fields: &[],
    },
];

/// Look up a command by its name
pub fn by_name(name: &str) -> Option<&'static CommandDescriptor> {
    COMMANDS.iter().find(|c| c.name == name)
}

/// Look up the command whose data reply carries `opcode`
pub fn by_response_opcode(opcode: [u8; 2]) -> Option<&'static CommandDescriptor> {
    COMMANDS.iter().find(|c| c.response == Some(opcode))
}

/// All known commands
pub fn list() -> &'static [CommandDescriptor] {
    COMMANDS
}

/// Catalog of all commands in their serializable form
pub fn catalog() -> Vec<CommandInfo> {
    COMMANDS.iter().map(CommandDescriptor::info).collect()
}
