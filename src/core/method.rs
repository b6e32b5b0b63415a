//! Raw method attributes as delivered by the corpus load primitive.
//!
//! These types mirror what a dex reader reports for a method: its identity,
//! access flags, prototype and instruction stream. They carry no derived data;
//! feature extraction happens in [`crate::core::featureset`].

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum::{EnumCount, EnumIter, EnumString, IntoStaticStr};

bitflags! {
    /// Dalvik method access flags.
    ///
    /// Values follow the dex format. Flags that only apply to classes or
    /// fields (INTERFACE, ANNOTATION, ENUM, VOLATILE, TRANSIENT) are omitted.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct AccessFlags: u32 {
        /// Visible everywhere
        const PUBLIC = 0x1;
        /// Only visible to the defining class
        const PRIVATE = 0x2;
        /// Visible to the package and subclasses
        const PROTECTED = 0x4;
        /// Not bound to an instance
        const STATIC = 0x8;
        /// Not overridable
        const FINAL = 0x10;
        /// Associated lock is acquired around calls
        const SYNCHRONIZED = 0x20;
        /// Compiler-generated type-safe bridge
        const BRIDGE = 0x40;
        /// Last argument is a rest argument
        const VARARGS = 0x80;
        /// Implemented in native code
        const NATIVE = 0x100;
        /// Not implemented by this class
        const ABSTRACT = 0x400;
        /// Strict floating point rules
        const STRICTFP = 0x800;
        /// Not directly defined in source
        const SYNTHETIC = 0x1000;
        /// Constructor or class initializer
        const CONSTRUCTOR = 0x10000;
        /// Declared `synchronized` in source
        const DECLARED_SYNCHRONIZED = 0x20000;
    }
}

impl AccessFlags {
    /// Name of a single-bit flag, `None` for empty or compound values.
    pub fn flag_name(self) -> Option<&'static str> {
        if self.bits().count_ones() != 1 {
            return None;
        }
        self.iter_names().next().map(|(name, _)| name)
    }

    /// Split into single-bit flags in ascending bit order.
    pub fn single_flags(self) -> impl Iterator<Item = AccessFlags> {
        self.iter_names().map(|(_, flag)| flag)
    }
}

impl Serialize for AccessFlags {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.bits())
    }
}

impl<'de> Deserialize<'de> for AccessFlags {
    /// Accepts raw bits (`9`), flag text (`"PUBLIC | STATIC"`) or a list of names.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Bits(u32),
            Text(String),
            Names(Vec<String>),
        }

        let names: Vec<String> = match Repr::deserialize(deserializer)? {
            Repr::Bits(bits) => {
                return AccessFlags::from_bits(bits).ok_or_else(|| {
                    serde::de::Error::custom(format!("unknown access flag bits {bits:#x}"))
                });
            }
            Repr::Text(text) => text
                .split('|')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect(),
            Repr::Names(names) => names,
        };

        names.iter().try_fold(AccessFlags::empty(), |acc, name| {
            AccessFlags::from_name(name)
                .map(|flag| acc | flag)
                .ok_or_else(|| serde::de::Error::custom(format!("unknown access flag '{name}'")))
        })
    }
}

macro_rules! define_opcodes {
    ($($variant:ident = $name:tt),* $(,)?) => {
        /// Dalvik opcodes, spelled the way pattern text and corpus listings spell them.
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            EnumString, IntoStaticStr, EnumIter, EnumCount,
        )]
        #[allow(missing_docs)]
        pub enum Opcode {
            $(#[strum(serialize = $name)] $variant,)*
        }
    };
}

define_opcodes! {
    Nop = "NOP",
    Move = "MOVE",
    MoveFrom16 = "MOVE_FROM16",
    Move16 = "MOVE_16",
    MoveWide = "MOVE_WIDE",
    MoveObject = "MOVE_OBJECT",
    MoveResult = "MOVE_RESULT",
    MoveResultWide = "MOVE_RESULT_WIDE",
    MoveResultObject = "MOVE_RESULT_OBJECT",
    MoveException = "MOVE_EXCEPTION",
    ReturnVoid = "RETURN_VOID",
    Return = "RETURN",
    ReturnWide = "RETURN_WIDE",
    ReturnObject = "RETURN_OBJECT",
    Const4 = "CONST_4",
    Const16 = "CONST_16",
    Const = "CONST",
    ConstHigh16 = "CONST_HIGH16",
    ConstWide16 = "CONST_WIDE_16",
    ConstWide32 = "CONST_WIDE_32",
    ConstWide = "CONST_WIDE",
    ConstWideHigh16 = "CONST_WIDE_HIGH16",
    ConstString = "CONST_STRING",
    ConstStringJumbo = "CONST_STRING_JUMBO",
    ConstClass = "CONST_CLASS",
    MonitorEnter = "MONITOR_ENTER",
    MonitorExit = "MONITOR_EXIT",
    CheckCast = "CHECK_CAST",
    InstanceOf = "INSTANCE_OF",
    ArrayLength = "ARRAY_LENGTH",
    NewInstance = "NEW_INSTANCE",
    NewArray = "NEW_ARRAY",
    FilledNewArray = "FILLED_NEW_ARRAY",
    FilledNewArrayRange = "FILLED_NEW_ARRAY_RANGE",
    FillArrayData = "FILL_ARRAY_DATA",
    Throw = "THROW",
    Goto = "GOTO",
    Goto16 = "GOTO_16",
    Goto32 = "GOTO_32",
    PackedSwitch = "PACKED_SWITCH",
    SparseSwitch = "SPARSE_SWITCH",
    CmplFloat = "CMPL_FLOAT",
    CmpgFloat = "CMPG_FLOAT",
    CmplDouble = "CMPL_DOUBLE",
    CmpgDouble = "CMPG_DOUBLE",
    CmpLong = "CMP_LONG",
    IfEq = "IF_EQ",
    IfNe = "IF_NE",
    IfLt = "IF_LT",
    IfGe = "IF_GE",
    IfGt = "IF_GT",
    IfLe = "IF_LE",
    IfEqz = "IF_EQZ",
    IfNez = "IF_NEZ",
    IfLtz = "IF_LTZ",
    IfGez = "IF_GEZ",
    IfGtz = "IF_GTZ",
    IfLez = "IF_LEZ",
    Aget = "AGET",
    AgetWide = "AGET_WIDE",
    AgetObject = "AGET_OBJECT",
    AgetBoolean = "AGET_BOOLEAN",
    AgetByte = "AGET_BYTE",
    AgetChar = "AGET_CHAR",
    AgetShort = "AGET_SHORT",
    Aput = "APUT",
    AputWide = "APUT_WIDE",
    AputObject = "APUT_OBJECT",
    AputBoolean = "APUT_BOOLEAN",
    AputByte = "APUT_BYTE",
    AputChar = "APUT_CHAR",
    AputShort = "APUT_SHORT",
    Iget = "IGET",
    IgetWide = "IGET_WIDE",
    IgetObject = "IGET_OBJECT",
    IgetBoolean = "IGET_BOOLEAN",
    IgetByte = "IGET_BYTE",
    IgetChar = "IGET_CHAR",
    IgetShort = "IGET_SHORT",
    Iput = "IPUT",
    IputWide = "IPUT_WIDE",
    IputObject = "IPUT_OBJECT",
    IputBoolean = "IPUT_BOOLEAN",
    IputByte = "IPUT_BYTE",
    IputChar = "IPUT_CHAR",
    IputShort = "IPUT_SHORT",
    Sget = "SGET",
    SgetWide = "SGET_WIDE",
    SgetObject = "SGET_OBJECT",
    SgetBoolean = "SGET_BOOLEAN",
    SgetByte = "SGET_BYTE",
    SgetChar = "SGET_CHAR",
    SgetShort = "SGET_SHORT",
    Sput = "SPUT",
    SputWide = "SPUT_WIDE",
    SputObject = "SPUT_OBJECT",
    SputBoolean = "SPUT_BOOLEAN",
    SputByte = "SPUT_BYTE",
    SputChar = "SPUT_CHAR",
    SputShort = "SPUT_SHORT",
    InvokeVirtual = "INVOKE_VIRTUAL",
    InvokeSuper = "INVOKE_SUPER",
    InvokeDirect = "INVOKE_DIRECT",
    InvokeStatic = "INVOKE_STATIC",
    InvokeInterface = "INVOKE_INTERFACE",
    InvokeVirtualRange = "INVOKE_VIRTUAL_RANGE",
    InvokeSuperRange = "INVOKE_SUPER_RANGE",
    InvokeDirectRange = "INVOKE_DIRECT_RANGE",
    InvokeStaticRange = "INVOKE_STATIC_RANGE",
    InvokeInterfaceRange = "INVOKE_INTERFACE_RANGE",
    InvokePolymorphic = "INVOKE_POLYMORPHIC",
    InvokeCustom = "INVOKE_CUSTOM",
    NegInt = "NEG_INT",
    NotInt = "NOT_INT",
    NegLong = "NEG_LONG",
    NotLong = "NOT_LONG",
    NegFloat = "NEG_FLOAT",
    NegDouble = "NEG_DOUBLE",
    IntToLong = "INT_TO_LONG",
    IntToFloat = "INT_TO_FLOAT",
    IntToDouble = "INT_TO_DOUBLE",
    LongToInt = "LONG_TO_INT",
    FloatToInt = "FLOAT_TO_INT",
    DoubleToInt = "DOUBLE_TO_INT",
    IntToByte = "INT_TO_BYTE",
    IntToChar = "INT_TO_CHAR",
    IntToShort = "INT_TO_SHORT",
    AddInt = "ADD_INT",
    SubInt = "SUB_INT",
    MulInt = "MUL_INT",
    DivInt = "DIV_INT",
    RemInt = "REM_INT",
    AndInt = "AND_INT",
    OrInt = "OR_INT",
    XorInt = "XOR_INT",
    ShlInt = "SHL_INT",
    ShrInt = "SHR_INT",
    UshrInt = "USHR_INT",
    AddLong = "ADD_LONG",
    SubLong = "SUB_LONG",
    MulLong = "MUL_LONG",
    DivLong = "DIV_LONG",
    AddFloat = "ADD_FLOAT",
    MulFloat = "MUL_FLOAT",
    AddDouble = "ADD_DOUBLE",
    MulDouble = "MUL_DOUBLE",
    AddInt2addr = "ADD_INT_2ADDR",
    SubInt2addr = "SUB_INT_2ADDR",
    MulInt2addr = "MUL_INT_2ADDR",
    AndInt2addr = "AND_INT_2ADDR",
    OrInt2addr = "OR_INT_2ADDR",
    AddLong2addr = "ADD_LONG_2ADDR",
    AddIntLit16 = "ADD_INT_LIT16",
    RsubInt = "RSUB_INT",
    MulIntLit16 = "MUL_INT_LIT16",
    AndIntLit16 = "AND_INT_LIT16",
    AddIntLit8 = "ADD_INT_LIT8",
    RsubIntLit8 = "RSUB_INT_LIT8",
    MulIntLit8 = "MUL_INT_LIT8",
    DivIntLit8 = "DIV_INT_LIT8",
    RemIntLit8 = "REM_INT_LIT8",
    AndIntLit8 = "AND_INT_LIT8",
    OrIntLit8 = "OR_INT_LIT8",
    ShlIntLit8 = "SHL_INT_LIT8",
    ShrIntLit8 = "SHR_INT_LIT8",
    UshrIntLit8 = "USHR_INT_LIT8",
}

impl Opcode {
    /// Pattern-text spelling, e.g. `CONST_STRING`.
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// True for every `invoke-*` form.
    pub fn is_invoke(self) -> bool {
        matches!(
            self,
            Opcode::InvokeVirtual
                | Opcode::InvokeSuper
                | Opcode::InvokeDirect
                | Opcode::InvokeStatic
                | Opcode::InvokeInterface
                | Opcode::InvokeVirtualRange
                | Opcode::InvokeSuperRange
                | Opcode::InvokeDirectRange
                | Opcode::InvokeStaticRange
                | Opcode::InvokeInterfaceRange
                | Opcode::InvokePolymorphic
                | Opcode::InvokeCustom
        )
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Opcode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Opcode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse()
            .map_err(|_| serde::de::Error::custom(format!("unknown opcode '{name}'")))
    }
}

/// A method referenced by an invoke instruction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodReference {
    /// Type descriptor of the declaring class
    pub defining_class: String,
    /// Method name
    pub name: String,
    /// Parameter type descriptors
    #[serde(default)]
    pub parameter_types: Vec<String>,
    /// Return type descriptor
    pub return_type: String,
}

/// A field referenced by a get/put instruction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldReference {
    /// Type descriptor of the declaring class
    pub defining_class: String,
    /// Field name
    pub name: String,
    /// Field type descriptor
    #[serde(rename = "type")]
    pub field_type: String,
}

/// Constant-pool item an instruction points at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InstructionReference {
    /// String literal (`const-string`)
    String {
        /// Literal value
        value: String,
    },
    /// Invoked method
    Method(MethodReference),
    /// Accessed field
    Field(FieldReference),
    /// Type descriptor (`new-instance`, `check-cast`, ...)
    Type {
        /// Type descriptor
        descriptor: String,
    },
}

/// One decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instruction {
    /// Instruction opcode
    pub opcode: Opcode,
    /// Referenced constant-pool item, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<InstructionReference>,
}

impl Instruction {
    /// Instruction without a reference.
    pub fn new(opcode: Opcode) -> Self {
        Self {
            opcode,
            reference: None,
        }
    }

    /// `const-string` loading `value`.
    pub fn const_string(value: impl Into<String>) -> Self {
        Self {
            opcode: Opcode::ConstString,
            reference: Some(InstructionReference::String {
                value: value.into(),
            }),
        }
    }

    /// Instruction with an explicit reference.
    pub fn with_reference(opcode: Opcode, reference: InstructionReference) -> Self {
        Self {
            opcode,
            reference: Some(reference),
        }
    }

    /// The string literal this instruction loads, if any.
    pub fn string_literal(&self) -> Option<&str> {
        match &self.reference {
            Some(InstructionReference::String { value }) => Some(value),
            _ => None,
        }
    }
}

/// Stable, human-readable method identity: `Lpkg/Cls;->name(params)ret`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MethodId(String);

impl MethodId {
    /// Wrap an already formatted descriptor.
    pub fn new(descriptor: impl Into<String>) -> Self {
        Self(descriptor.into())
    }

    /// Descriptor text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MethodId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A method with its raw static attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDef {
    /// Type descriptor of the containing class, e.g. `Lcom/app/Foo;`
    pub defining_class: String,
    /// Declared name
    pub name: String,
    /// Access flags
    #[serde(default = "AccessFlags::empty")]
    pub access_flags: AccessFlags,
    /// Parameter type descriptors
    #[serde(default)]
    pub parameter_types: Vec<String>,
    /// Return type descriptor
    pub return_type: String,
    /// Decoded instruction stream (empty for abstract/native methods)
    #[serde(default)]
    pub instructions: Vec<Instruction>,
}

impl MethodDef {
    /// Create a method with no flags, parameters or code.
    pub fn new(
        defining_class: impl Into<String>,
        name: impl Into<String>,
        return_type: impl Into<String>,
    ) -> Self {
        Self {
            defining_class: defining_class.into(),
            name: name.into(),
            access_flags: AccessFlags::empty(),
            parameter_types: Vec::new(),
            return_type: return_type.into(),
            instructions: Vec::new(),
        }
    }

    /// Set the access flags
    pub fn with_flags(mut self, flags: AccessFlags) -> Self {
        self.access_flags = flags;
        self
    }

    /// Set the parameter types
    pub fn with_parameters<I, S>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parameter_types = parameters.into_iter().map(Into::into).collect();
        self
    }

    /// Set the instruction stream
    pub fn with_instructions(mut self, instructions: Vec<Instruction>) -> Self {
        self.instructions = instructions;
        self
    }

    /// Full descriptor identity.
    pub fn id(&self) -> MethodId {
        MethodId(format!("{}->{}", self.defining_class, self.short_id()))
    }

    /// `name(params)ret`, the form decompilers use to look a method up inside its class.
    pub fn short_id(&self) -> String {
        format!(
            "{}({}){}",
            self.name,
            self.parameter_types.concat(),
            self.return_type
        )
    }

    /// Iterate over the string literals referenced by the method, in code order.
    pub fn string_literals(&self) -> impl Iterator<Item = &str> {
        self.instructions.iter().filter_map(Instruction::string_literal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_identity() {
        let method = MethodDef::new("Lcom/app/Foo;", "bar", "V").with_parameters(["I", "Ljava/lang/String;"]);

        assert_eq!(method.short_id(), "bar(ILjava/lang/String;)V");
        assert_eq!(
            method.id().as_str(),
            "Lcom/app/Foo;->bar(ILjava/lang/String;)V"
        );
    }

    #[test]
    fn test_opcode_names_round_trip() {
        use strum::IntoEnumIterator;

        for opcode in Opcode::iter() {
            let parsed: Opcode = opcode.name().parse().unwrap();
            assert_eq!(parsed, opcode);
        }
        assert_eq!(Opcode::AddInt2addr.name(), "ADD_INT_2ADDR");
        assert!("const-string".parse::<Opcode>().is_err());
    }

    #[test]
    fn test_access_flag_names() {
        assert_eq!(AccessFlags::PUBLIC.flag_name(), Some("PUBLIC"));
        assert_eq!((AccessFlags::PUBLIC | AccessFlags::FINAL).flag_name(), None);
        assert_eq!(AccessFlags::from_name("STATIC"), Some(AccessFlags::STATIC));

        let split: Vec<_> = (AccessFlags::FINAL | AccessFlags::PUBLIC).single_flags().collect();
        assert_eq!(split, vec![AccessFlags::PUBLIC, AccessFlags::FINAL]);
    }

    #[test]
    fn test_method_deserialization() {
        let json = r#"{
            "defining_class": "Lcom/app/Foo;",
            "name": "bar",
            "access_flags": 9,
            "return_type": "Z",
            "instructions": [
                {"opcode": "CONST_STRING", "reference": {"kind": "string", "value": "hello"}},
                {"opcode": "RETURN"}
            ]
        }"#;

        let method: MethodDef = serde_json::from_str(json).unwrap();
        assert_eq!(method.access_flags, AccessFlags::PUBLIC | AccessFlags::STATIC);
        assert_eq!(method.string_literals().collect::<Vec<_>>(), vec!["hello"]);
        assert_eq!(method.instructions[1].opcode, Opcode::Return);
    }
}
