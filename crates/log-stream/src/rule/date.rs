//! 그룹 날짜 형식 -- `date` 캡처를 시각으로 변환
//!
//! 두 가지 표기법을 받습니다.
//! - Go 기준 레이아웃: `02/Jan/2006:15:04:05 -0700` 처럼 기준 시각
//!   `Mon Jan 2 15:04:05 -0700 MST 2006`을 원하는 모양으로 쓴 문자열
//! - strftime: `%`를 포함하면 chrono 형식 문자열로 그대로 사용
//!
//! 시간대가 없는 형식은 UTC로, 연도가 없는 형식(syslog 등)은 현재 연도로 해석합니다.

use chrono::format::{Item, ParseErrorKind, StrftimeItems};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};

use crate::error::LogStreamError;

/// Go 레이아웃 토큰 → strftime 지시자
///
/// 같은 위치에서 긴 토큰이 먼저 검사되도록 순서를 유지해야 합니다.
const GO_LAYOUT_TOKENS: &[(&str, &str)] = &[
    ("January", "%B"),
    ("Monday", "%A"),
    ("-07:00:00", "%::z"),
    ("Z07:00:00", "%::z"),
    ("-07:00", "%:z"),
    ("Z07:00", "%:z"),
    ("-0700", "%z"),
    ("Z0700", "%z"),
    ("-07", "%#z"),
    ("Z07", "%#z"),
    ("2006", "%Y"),
    (".000000000", "%.9f"),
    (".000000", "%.6f"),
    (".000", "%.3f"),
    (".999999999", "%.f"),
    (".999999", "%.f"),
    (".999", "%.f"),
    ("Jan", "%b"),
    ("Mon", "%a"),
    ("MST", "%Z"),
    ("002", "%j"),
    ("__2", "%j"),
    ("_2", "%e"),
    ("01", "%m"),
    ("02", "%d"),
    ("03", "%I"),
    ("04", "%M"),
    ("05", "%S"),
    ("06", "%y"),
    ("15", "%H"),
    ("PM", "%p"),
    ("pm", "%p"),
    ("1", "%m"),
    ("2", "%d"),
    ("3", "%I"),
    ("4", "%M"),
    ("5", "%S"),
];

/// `Z`로 시작하는 Go 시간대 토큰. 값 자리에 `Z`가 오면 UTC를 뜻합니다.
const GO_ZULU_TOKENS: &[&str] = &["Z07:00:00", "Z07:00", "Z0700", "Z07"];

/// 컴파일된 날짜 형식
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateLayout {
    /// 설정에 적힌 원본 형식
    source: String,
    /// chrono strftime 형식
    strftime: String,
    /// `Z` 토큰 자리를 리터럴 `Z`로 둔 형식 (UTC로 해석)
    zulu_strftime: Option<String>,
}

impl DateLayout {
    /// 날짜 형식을 컴파일합니다.
    ///
    /// chrono가 해석할 수 없는 지시자가 있으면 `Construction` 에러를 반환합니다.
    pub fn new(format: &str) -> Result<Self, LogStreamError> {
        let (strftime, zulu_strftime) = if format.contains('%') {
            (format.to_owned(), None)
        } else {
            let zulu = GO_ZULU_TOKENS
                .iter()
                .any(|token| format.contains(token))
                .then(|| translate_go_layout(format, true));
            (translate_go_layout(format, false), zulu)
        };

        for fmt in std::iter::once(&strftime).chain(zulu_strftime.as_ref()) {
            if StrftimeItems::new(fmt).any(|item| matches!(item, Item::Error)) {
                return Err(LogStreamError::Construction {
                    what: format!("date format '{format}'"),
                    reason: format!("unsupported directive in '{fmt}'"),
                });
            }
        }

        Ok(Self {
            source: format.to_owned(),
            strftime,
            zulu_strftime,
        })
    }

    /// 설정에 적힌 원본 형식을 반환합니다.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// 변환된 strftime 형식을 반환합니다.
    pub fn strftime(&self) -> &str {
        &self.strftime
    }

    /// 날짜 문자열을 UTC 시각으로 파싱합니다.
    ///
    /// Go 레이아웃의 `Z07:00` 같은 토큰 자리에 `Z`가 오면 UTC로 해석합니다.
    pub fn parse(&self, raw: &str) -> Result<DateTime<Utc>, LogStreamError> {
        let result = match (parse_any_year(raw, &self.strftime), &self.zulu_strftime) {
            (Err(e), Some(zulu)) => parse_any_year(raw, zulu).map_err(|_| e),
            (result, _) => result,
        };

        result.map_err(|e| LogStreamError::DateParse {
            raw: raw.to_owned(),
            format: self.source.clone(),
            reason: e.to_string(),
        })
    }
}

/// 연도가 빠진 형식이면 현재 연도를 붙여 다시 시도합니다.
fn parse_any_year(raw: &str, fmt: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    match parse_with(raw, fmt) {
        Err(e) if e.kind() == ParseErrorKind::NotEnough => {
            let year = Utc::now().year();
            parse_with(&format!("{year} {raw}"), &format!("%Y {fmt}")).map_err(|_| e)
        }
        other => other,
    }
}

/// 시간대 포함 → 시간대 없음 → 날짜만 순서로 시도합니다.
fn parse_with(raw: &str, fmt: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    match DateTime::parse_from_str(raw, fmt) {
        Ok(dt) => return Ok(dt.with_timezone(&Utc)),
        Err(e) if e.kind() != ParseErrorKind::NotEnough => return Err(e),
        Err(_) => {}
    }

    match NaiveDateTime::parse_from_str(raw, fmt) {
        Ok(naive) => return Ok(naive.and_utc()),
        Err(e) if e.kind() != ParseErrorKind::NotEnough => return Err(e),
        Err(_) => {}
    }

    NaiveDate::parse_from_str(raw, fmt).map(|date| date.and_time(chrono::NaiveTime::MIN).and_utc())
}

/// Go 기준 레이아웃을 strftime 형식으로 변환합니다.
///
/// 토큰이 아닌 문자는 그대로 두고, `%`는 `%%`로 이스케이프합니다.
pub fn go_layout_to_strftime(layout: &str) -> String {
    translate_go_layout(layout, false)
}

/// `zulu`가 참이면 `Z` 시간대 토큰을 리터럴 `Z`로 씁니다.
fn translate_go_layout(layout: &str, zulu: bool) -> String {
    let mut out = String::with_capacity(layout.len() * 2);
    let mut rest = layout;

    'outer: while !rest.is_empty() {
        for (token, directive) in GO_LAYOUT_TOKENS {
            if let Some(tail) = rest.strip_prefix(token) {
                if zulu && GO_ZULU_TOKENS.contains(token) {
                    out.push('Z');
                } else {
                    out.push_str(directive);
                }
                rest = tail;
                continue 'outer;
            }
        }

        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            if c == '%' {
                out.push_str("%%");
            } else {
                out.push(c);
            }
        }
        rest = chars.as_str();
    }

    out
}
