use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use kvcfg::{
    from_reader, from_reader_with_grammar, from_slice, from_str, key_value_record, schema_for,
    to_string, to_writer_with_grammar, Deserializer, Error, GrammarConfig, TemporalFormat,
};
use rust_decimal::Decimal;
use std::str::FromStr;
use uuid::Uuid;

key_value_record! {
    #[derive(Debug, Default, Clone, PartialEq)]
    pub struct TestSerial {
        pub string: Option<String>,
        pub strings: Option<Vec<String>>,
        pub bool: Option<bool>,
        pub bools: Option<Vec<bool>>,
        pub date_time as "dateTime": Option<NaiveDateTime>,
        pub date_times as "dateTimes": Option<Vec<NaiveDateTime>>,
        pub date_time_offset as "dateTimeOffset": Option<DateTime<FixedOffset>>,
        pub date_time_offsets as "dateTimeOffsets": Option<Vec<DateTime<FixedOffset>>>,
        pub time_span as "timeSpan": Option<Duration>,
        pub time_spans as "timeSpans": Option<Vec<Duration>>,
        pub guid: Option<Uuid>,
        pub guids: Option<Vec<Uuid>>,
        pub sbyte: Option<i8>,
        pub sbytes: Option<Vec<i8>>,
        pub byte: Option<u8>,
        pub bytes: Option<Vec<u8>>,
        pub short: Option<i16>,
        pub shorts: Option<Vec<i16>>,
        pub ushort: Option<u16>,
        pub ushorts: Option<Vec<u16>>,
        pub int: Option<i32>,
        pub ints: Option<Vec<i32>>,
        pub uint: Option<u32>,
        pub uints: Option<Vec<u32>>,
        pub long: Option<i64>,
        pub longs: Option<Vec<i64>>,
        pub ulong: Option<u64>,
        pub ulongs: Option<Vec<u64>>,
        pub float: Option<f32>,
        pub floats: Option<Vec<f32>>,
        pub double: Option<f64>,
        pub doubles: Option<Vec<f64>>,
        pub decimal: Option<Decimal>,
        pub decimals: Option<Vec<Decimal>>,
    }
}

const FULL_INPUT: &str = "string = \"TestString\";\r\n\
    strings = {\"One\", \"Two\", \"Three\"};\r\n\
    bool = true;\r\n\
    bools = {true, false, true};\r\n\
    dateTime = 2023-01-01T00:00:00.0000000;\n\
    dateTimes = {2023-01-02T00:00:00.0000000};\n\
    dateTimeOffset = 2023-01-03T00:00:00.0000000+00:00;\n\
    dateTimeOffsets = {2023-01-04T00:00:00.0000000+00:00, 2023-01-05T00:00:00.0000000+00:00};\n\
    timeSpan = 01:00:00;\r\n\
    timeSpans = {02:00:00, 03:00:00};\r\n\
    guid = 12345678-abcd-1234-abcd-1234567890ab;\r\n\
    guids = {22345678-abcd-1234-abcd-1234567890ab, 32345678-abcd-1234-abcd-1234567890ab};\r\n\
    sbyte = 1;\r\n\
    sbytes = {2, 3, 4};\r\n\
    byte = 5;\r\n\
    bytes = {6, 7, 8};\r\n\
    short = 9;\r\n\
    shorts = {10, 11, 12};\r\n\
    ushort = 13;\r\n\
    ushorts = {14, 15, 16};\r\n\
    int = 17;\r\n\
    ints = {18, 19, 20};\r\n\
    uint = 21;\r\n\
    uints = {22, 23, 24};\r\n\
    long = 25;\r\n\
    longs = {26, 27, 28};\r\n\
    ulong = 29;\r\n\
    ulongs = {30, 31, 32};\r\n\
    float = 33.3;\r\n\
    floats = {34.4, 35.5, 36.6};\r\n\
    double = 37.7;\r\n\
    doubles = {38.8, 39.9, 40};\r\n\
    decimal = 41.1;\r\n\
    decimals = {42.2, 43.3, 44.4};\r\n";

fn midnight(day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2023, 1, day)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn utc_midnight(day: u32) -> DateTime<FixedOffset> {
    FixedOffset::east_opt(0)
        .unwrap()
        .from_utc_datetime(&midnight(day))
}

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn full_record() -> TestSerial {
    TestSerial {
        string: Some("TestString".into()),
        strings: Some(vec!["One".into(), "Two".into(), "Three".into()]),
        bool: Some(true),
        bools: Some(vec![true, false, true]),
        date_time: Some(midnight(1)),
        date_times: Some(vec![midnight(2)]),
        date_time_offset: Some(utc_midnight(3)),
        date_time_offsets: Some(vec![utc_midnight(4), utc_midnight(5)]),
        time_span: Some(Duration::hours(1)),
        time_spans: Some(vec![Duration::hours(2), Duration::hours(3)]),
        guid: Some(Uuid::parse_str("12345678-abcd-1234-abcd-1234567890ab").unwrap()),
        guids: Some(vec![
            Uuid::parse_str("22345678-abcd-1234-abcd-1234567890ab").unwrap(),
            Uuid::parse_str("32345678-abcd-1234-abcd-1234567890ab").unwrap(),
        ]),
        sbyte: Some(1),
        sbytes: Some(vec![2, 3, 4]),
        byte: Some(5),
        bytes: Some(vec![6, 7, 8]),
        short: Some(9),
        shorts: Some(vec![10, 11, 12]),
        ushort: Some(13),
        ushorts: Some(vec![14, 15, 16]),
        int: Some(17),
        ints: Some(vec![18, 19, 20]),
        uint: Some(21),
        uints: Some(vec![22, 23, 24]),
        long: Some(25),
        longs: Some(vec![26, 27, 28]),
        ulong: Some(29),
        ulongs: Some(vec![30, 31, 32]),
        float: Some(33.3),
        floats: Some(vec![34.4, 35.5, 36.6]),
        double: Some(37.7),
        doubles: Some(vec![38.8, 39.9, 40.0]),
        decimal: Some(dec("41.1")),
        decimals: Some(vec![dec("42.2"), dec("43.3"), dec("44.4")]),
    }
}

#[test]
fn test_every_kind_deserializes() {
    let record: TestSerial = from_str(FULL_INPUT).unwrap();
    assert_eq!(record, full_record());
}

#[test]
fn test_every_kind_round_trips() {
    let record = full_record();
    let text = to_string(&record).unwrap();
    let back: TestSerial = from_str(&text).unwrap();
    assert_eq!(back, record);
}

#[test]
fn test_serialized_lines() {
    let text = to_string(&full_record()).unwrap();
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines.len(), 34);
    assert_eq!(lines[0], "string = \"TestString\";");
    assert_eq!(lines[1], "strings = {\"One\", \"Two\", \"Three\"};");
    assert_eq!(lines[3], "bools = {true, false, true};");
    assert_eq!(lines[4], "dateTime = 2023-01-01T00:00:00;");
    assert_eq!(lines[6], "dateTimeOffset = 2023-01-03T00:00:00+00:00;");
    assert_eq!(lines[9], "timeSpans = {02:00:00, 03:00:00};");
    assert_eq!(lines[10], "guid = 12345678-abcd-1234-abcd-1234567890ab;");
    assert_eq!(lines[28], "float = 33.3;");
    assert_eq!(lines[31], "doubles = {38.8, 39.9, 40};");
    assert_eq!(lines[33], "decimals = {42.2, 43.3, 44.4};");
}

#[test]
fn test_partial_record_round_trips() {
    let record = TestSerial {
        strings: Some(vec![]),
        ulong: Some(u64::MAX),
        sbyte: Some(i8::MIN),
        ..TestSerial::default()
    };
    let text = to_string(&record).unwrap();
    assert_eq!(text, "strings = {};\nsbyte = -128;\nulong = 18446744073709551615;\n");
    assert_eq!(from_str::<TestSerial>(&text).unwrap(), record);
}

#[test]
fn test_every_split_point() {
    let input = FULL_INPUT.as_bytes();
    let expected = full_record();

    for split in 0..=input.len() {
        let mut de = Deserializer::<TestSerial>::for_record().unwrap();
        let used = de.feed(&input[..split]).unwrap();
        assert!(used <= split);

        let rest = &input[used..];
        let used = de.feed(rest).unwrap();
        let record = de.finish(&rest[used..]).unwrap();
        assert_eq!(record, expected, "split at {split}");
    }
}

#[test]
fn test_reader_chunk_sizes() {
    let expected = full_record();
    let grammar = GrammarConfig::default();
    for chunk in [1, 2, 3, 7, 16, 64, 4096] {
        let record: TestSerial =
            from_reader_with_grammar(FULL_INPUT.as_bytes(), &grammar, chunk).unwrap();
        assert_eq!(record, expected, "chunk size {chunk}");
    }
    let record: TestSerial = from_reader(FULL_INPUT.as_bytes()).unwrap();
    assert_eq!(record, expected);
}

#[test]
fn test_comments_and_filler() {
    let input = "\n\n// leading comment\n  int = 3; // trailing comment\n;;\n\t// another\nstring = \"a // not a comment\";\n// comment at end of input";
    let record: TestSerial = from_str(input).unwrap();
    assert_eq!(record.int, Some(3));
    assert_eq!(record.string.as_deref(), Some("a // not a comment"));
}

#[test]
fn test_repeated_key_keeps_last_value() {
    let record: TestSerial = from_str("int = 1;\nint = 2;\n").unwrap();
    assert_eq!(record.int, Some(2));
}

#[test]
fn test_quoted_and_bare_forms() {
    let record: TestSerial =
        from_str("int = \"42\";\nstring =   bare words  ;\nguids = {\"22345678-abcd-1234-abcd-1234567890ab\"};")
            .unwrap();
    assert_eq!(record.int, Some(42));
    assert_eq!(record.string.as_deref(), Some("bare words"));
    assert_eq!(record.guids.map(|g| g.len()), Some(1));
}

#[test]
fn test_escaped_delimiter_round_trips() {
    let record = TestSerial {
        string: Some("He said \"hi\"".into()),
        strings: Some(vec!["a, b".into(), "{c}".into(), "d\"".into()]),
        ..TestSerial::default()
    };
    let text = to_string(&record).unwrap();
    assert_eq!(
        text,
        "string = \"He said \\\"hi\\\"\";\nstrings = {\"a, b\", \"{c}\", \"d\\\"\"};\n"
    );
    assert_eq!(from_str::<TestSerial>(&text).unwrap(), record);
}

#[test]
fn test_unknown_key() {
    let err = from_str::<TestSerial>("int = 1;\n\n  bogus = 2;\n").unwrap_err();
    match err {
        Error::UnknownKey { key, line, offset } => {
            assert_eq!(key, "bogus");
            assert_eq!(line, 3);
            assert_eq!(offset, 12);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_format_errors() {
    let cases = [
        ("byte = 256;", "byte"),
        ("bool = True;", "bool"),
        ("int = +5;", "int"),
        ("guid = 12345678abcd1234abcd1234567890ab;", "guid"),
        ("timeSpan = 25:00:00;", "timeSpan"),
        ("ints = {1, two, 3};", "ints"),
        ("dateTime = yesterday;", "dateTime"),
    ];
    for (input, field) in cases {
        match from_str::<TestSerial>(input) {
            Err(Error::Format { location, .. }) => {
                assert_eq!(location.field.as_deref(), Some(field), "{input}");
                assert_eq!(location.line, Some(1));
            }
            other => panic!("{input}: unexpected result {other:?}"),
        }
    }
}

#[test]
fn test_truncated_input() {
    for input in ["string = \"open", "ints = {1, 2", "int = 5", "int"] {
        assert!(
            matches!(from_str::<TestSerial>(input), Err(Error::Truncated { .. })),
            "{input}"
        );
    }
}

#[test]
fn test_invalid_utf8_string_is_format_error() {
    let err = from_slice::<TestSerial>(b"string = \"\xff\xfe\";").unwrap_err();
    assert!(matches!(err, Error::Format { .. }));
}

#[test]
fn test_rfc1123_temporal_format() {
    let grammar = GrammarConfig::new().with_temporal_format(TemporalFormat::Rfc1123);
    let record = TestSerial {
        date_time: Some(midnight(1)),
        date_time_offset: Some(utc_midnight(3)),
        time_span: Some(Duration::minutes(90)),
        ..TestSerial::default()
    };

    let mut buffer = Vec::new();
    to_writer_with_grammar(&mut buffer, &record, &grammar).unwrap();
    assert_eq!(
        String::from_utf8(buffer.clone()).unwrap(),
        "dateTime = Sun, 01 Jan 2023 00:00:00 GMT;\n\
         dateTimeOffset = Tue, 03 Jan 2023 00:00:00 GMT;\n\
         timeSpan = 01:30:00;\n"
    );

    let back: TestSerial = from_reader_with_grammar(buffer.as_slice(), &grammar, 8).unwrap();
    assert_eq!(back, record);
}

#[test]
fn test_schema_shared_across_threads() {
    let handles: Vec<_> = (0..8)
        .map(|_| std::thread::spawn(|| schema_for::<TestSerial>().unwrap()))
        .collect();
    let schemas: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let first = schema_for::<TestSerial>().unwrap();
    assert_eq!(first.len(), 34);
    for schema in &schemas {
        assert!(std::sync::Arc::ptr_eq(schema, &first));
    }
}

#[test]
fn test_parallel_deserialization() {
    let handles: Vec<_> = (0..4)
        .map(|_| std::thread::spawn(|| from_str::<TestSerial>(FULL_INPUT).unwrap()))
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), full_record());
    }
}
