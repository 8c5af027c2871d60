use super::ProtocolError;

macro_rules! field_type {
    ($($name:ident = $tag:literal, $sql:literal, $doc:literal;)*) => {
        /// Column and parameter type tag.
        ///
        /// The numeric values are the server contract, they must never be
        /// reordered or reused.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum FieldType {
            $(#[doc = $doc] $name = $tag,)*
        }

        impl FieldType {
            /// Type tag on the wire.
            pub const fn tag(self) -> u8 {
                self as u8
            }

            /// Server side type name, e.g. `MYSQL_TYPE_LONG`.
            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$name => concat!("MYSQL_TYPE_", $sql),)*
                }
            }
        }

        impl TryFrom<u8> for FieldType {
            type Error = ProtocolError;

            fn try_from(tag: u8) -> Result<Self, Self::Error> {
                match tag {
                    $($tag => Ok(Self::$name),)*
                    _ => Err(ProtocolError::UnknownFieldType(tag)),
                }
            }
        }
    };
}

field_type! {
    Decimal = 0, "DECIMAL", "`DECIMAL`, sent as text";
    Tiny = 1, "TINY", "`TINYINT`, 1 byte";
    Short = 2, "SHORT", "`SMALLINT`, 2 bytes";
    Long = 3, "LONG", "`INT`, 4 bytes";
    Float = 4, "FLOAT", "`FLOAT`, 4 bytes";
    Double = 5, "DOUBLE", "`DOUBLE`, 8 bytes";
    Null = 6, "NULL", "`NULL`";
    Timestamp = 7, "TIMESTAMP", "`TIMESTAMP`";
    LongLong = 8, "LONGLONG", "`BIGINT`, 8 bytes";
    Int24 = 9, "INT24", "`MEDIUMINT`, sent in 4 bytes";
    Date = 10, "DATE", "`DATE`";
    Time = 11, "TIME", "`TIME`";
    DateTime = 12, "DATETIME", "`DATETIME`";
    Year = 13, "YEAR", "`YEAR`, 2 bytes";
    NewDate = 14, "NEWDATE", "internal to the server";
    VarChar = 15, "VARCHAR", "`VARCHAR`";
    Bit = 16, "BIT", "`BIT`, sent as bytes";
    Json = 245, "JSON", "`JSON`";
    NewDecimal = 246, "NEWDECIMAL", "`DECIMAL`, sent as text";
    Enum = 247, "ENUM", "`ENUM`";
    Set = 248, "SET", "`SET`";
    TinyBlob = 249, "TINY_BLOB", "`TINYBLOB`";
    MediumBlob = 250, "MEDIUM_BLOB", "`MEDIUMBLOB`";
    LongBlob = 251, "LONG_BLOB", "`LONGBLOB`";
    Blob = 252, "BLOB", "`BLOB`";
    VarString = 253, "VAR_STRING", "`VARCHAR`, `VARBINARY`";
    String = 254, "STRING", "`CHAR`, `BINARY`";
    Geometry = 255, "GEOMETRY", "spatial types";
}

impl FieldType {
    /// Width of the binary representation for fixed width types.
    pub const fn pack_len(self) -> Option<usize> {
        match self {
            Self::Tiny => Some(1),
            Self::Short | Self::Year => Some(2),
            Self::Long | Self::Int24 | Self::Float => Some(4),
            Self::LongLong | Self::Double => Some(8),
            Self::Null => Some(0),
            _ => None,
        }
    }

    /// Returns `true` for integer types, [`Year`][Self::Year] included.
    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            Self::Tiny | Self::Short | Self::Long | Self::LongLong | Self::Int24 | Self::Year
        )
    }

    /// Returns `true` for integer and floating point types.
    pub const fn is_numeric(self) -> bool {
        self.is_integer() || matches!(self, Self::Float | Self::Double)
    }

    /// Returns `true` for date and time types.
    pub const fn is_temporal(self) -> bool {
        matches!(
            self,
            Self::Date | Self::Time | Self::DateTime | Self::Timestamp | Self::NewDate
        )
    }

    /// Returns `true` for types sent as a length encoded string.
    pub const fn is_var_len(self) -> bool {
        matches!(
            self,
            Self::Decimal
                | Self::NewDecimal
                | Self::VarChar
                | Self::Bit
                | Self::Json
                | Self::Enum
                | Self::Set
                | Self::TinyBlob
                | Self::MediumBlob
                | Self::LongBlob
                | Self::Blob
                | Self::VarString
                | Self::String
                | Self::Geometry
        )
    }

    /// Returns `true` for types carrying decimal text.
    pub const fn is_decimal(self) -> bool {
        matches!(self, Self::Decimal | Self::NewDecimal)
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Column definition flags.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ColumnFlags(pub u16);

impl ColumnFlags {
    pub const NOT_NULL: u16 = 1;
    pub const PRIMARY_KEY: u16 = 2;
    pub const UNIQUE_KEY: u16 = 4;
    pub const MULTIPLE_KEY: u16 = 8;
    pub const BLOB: u16 = 16;
    pub const UNSIGNED: u16 = 32;
    pub const ZEROFILL: u16 = 64;
    pub const BINARY: u16 = 128;
    pub const ENUM: u16 = 256;
    pub const AUTO_INCREMENT: u16 = 512;
    pub const TIMESTAMP: u16 = 1024;
    pub const SET: u16 = 2048;
    pub const NO_DEFAULT_VALUE: u16 = 4096;
    pub const ON_UPDATE_NOW: u16 = 8192;
    pub const NUM: u16 = 32768;

    pub const fn contains(self, flag: u16) -> bool {
        self.0 & flag == flag
    }

    pub const fn is_unsigned(self) -> bool {
        self.contains(Self::UNSIGNED)
    }
}

impl std::fmt::Debug for ColumnFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        const NAMES: [(u16, &str); 15] = [
            (ColumnFlags::NOT_NULL, "NOT_NULL"),
            (ColumnFlags::PRIMARY_KEY, "PRIMARY_KEY"),
            (ColumnFlags::UNIQUE_KEY, "UNIQUE_KEY"),
            (ColumnFlags::MULTIPLE_KEY, "MULTIPLE_KEY"),
            (ColumnFlags::BLOB, "BLOB"),
            (ColumnFlags::UNSIGNED, "UNSIGNED"),
            (ColumnFlags::ZEROFILL, "ZEROFILL"),
            (ColumnFlags::BINARY, "BINARY"),
            (ColumnFlags::ENUM, "ENUM"),
            (ColumnFlags::AUTO_INCREMENT, "AUTO_INCREMENT"),
            (ColumnFlags::TIMESTAMP, "TIMESTAMP"),
            (ColumnFlags::SET, "SET"),
            (ColumnFlags::NO_DEFAULT_VALUE, "NO_DEFAULT_VALUE"),
            (ColumnFlags::ON_UPDATE_NOW, "ON_UPDATE_NOW"),
            (ColumnFlags::NUM, "NUM"),
        ];
        let mut list = f.debug_set();
        for (flag, name) in NAMES {
            if self.contains(flag) {
                list.entry(&format_args!("{name}"));
            }
        }
        list.finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn tag_values_are_stable() {
        assert_eq!(FieldType::Tiny.tag(), 1);
        assert_eq!(FieldType::LongLong.tag(), 8);
        assert_eq!(FieldType::Blob.tag(), 252);
        assert_eq!(FieldType::Geometry.tag(), 255);
        assert_eq!(FieldType::try_from(253).unwrap(), FieldType::VarString);
        assert!(FieldType::try_from(100).is_err());
        assert_eq!(FieldType::Long.name(), "MYSQL_TYPE_LONG");
        assert_eq!(FieldType::VarString.name(), "MYSQL_TYPE_VAR_STRING");
    }

    #[test]
    fn classification() {
        assert_eq!(FieldType::Year.pack_len(), Some(2));
        assert_eq!(FieldType::Int24.pack_len(), Some(4));
        assert_eq!(FieldType::String.pack_len(), None);
        assert!(FieldType::Bit.is_var_len());
        assert!(FieldType::Timestamp.is_temporal());
        assert!(!FieldType::Double.is_integer());
        assert!(FieldType::Double.is_numeric());
    }
}
