//! HDU dispatch and header editing against a scripted `FitsIo` backend.
//!
//! The backend answers type probes from a fixed table, so these tests only
//! exercise what `FitsFile` and `Hdu` do with the trait.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use fitshdu::card::{format_card, record_keyword, Record};
use fitshdu::{
    names_eq, Card, ElementType, Error, FitsFile, FitsIo, FormatOptions, HduKind, HduTypeCode,
    Result, SetMode, Value,
};

struct ScriptedHdu {
    code: HduTypeCode,
    element: ElementType,
    rank: usize,
    records: Vec<Record>,
}

struct Scripted {
    hdus: Vec<ScriptedHdu>,
    current: usize,
    closes: Arc<AtomicUsize>,
}

impl Scripted {
    fn hdu(&mut self) -> &mut ScriptedHdu {
        &mut self.hdus[self.current]
    }

    fn position(&mut self, name: &str) -> Option<usize> {
        self.hdu()
            .records
            .iter()
            .position(|r| names_eq(record_keyword(r), name))
    }
}

impl FitsIo for Scripted {
    fn move_to_absolute(&mut self, pos: usize) -> Result<HduTypeCode> {
        if pos == 0 || pos > self.hdus.len() {
            return Err(Error::NotFound(format!("HDU {pos}")));
        }
        self.current = pos - 1;
        Ok(self.hdus[self.current].code)
    }

    fn num_hdus(&mut self) -> Result<usize> {
        Ok(self.hdus.len())
    }

    fn header_space(&mut self) -> Result<(usize, usize)> {
        let n = self.hdu().records.len();
        Ok((n, 35usize.saturating_sub(n)))
    }

    fn read_record(&mut self, pos: usize) -> Result<Record> {
        self.hdu()
            .records
            .get(pos.wrapping_sub(1))
            .copied()
            .ok_or_else(|| Error::NotFound(format!("card {pos}")))
    }

    fn write_record(&mut self, record: &Record) -> Result<()> {
        self.hdu().records.push(*record);
        Ok(())
    }

    fn insert_record(&mut self, pos: usize, record: &Record) -> Result<()> {
        self.hdu().records.insert(pos - 1, *record);
        Ok(())
    }

    fn update_record(&mut self, name: &str, record: &Record) -> Result<()> {
        match self.position(name) {
            Some(i) => self.hdu().records[i] = *record,
            None => self.hdu().records.push(*record),
        }
        Ok(())
    }

    fn delete_record(&mut self, pos: usize) -> Result<()> {
        self.hdu().records.remove(pos - 1);
        Ok(())
    }

    fn delete_key(&mut self, name: &str) -> Result<()> {
        let i = self
            .position(name)
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        self.hdu().records.remove(i);
        Ok(())
    }

    fn image_equiv_type(&mut self) -> Result<ElementType> {
        Ok(self.hdu().element)
    }

    fn image_dim(&mut self) -> Result<usize> {
        Ok(self.hdu().rank)
    }

    fn close(&mut self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn records(cards: &[Card]) -> Vec<Record> {
    let options = FormatOptions::default();
    cards
        .iter()
        .flat_map(|c| format_card(c, &options).unwrap())
        .collect()
}

fn scripted() -> (FitsFile<Scripted>, Arc<AtomicUsize>) {
    let hdu = |code, element, rank, cards: &[Card]| ScriptedHdu {
        code,
        element,
        rank,
        records: records(cards),
    };
    let closes = Arc::new(AtomicUsize::new(0));
    let backend = Scripted {
        hdus: vec![
            hdu(HduTypeCode::Image, ElementType::F32, 2, &[Card::new("SIMPLE", true)]),
            hdu(
                HduTypeCode::BinaryTable,
                ElementType::U8,
                0,
                &[Card::new("EXTNAME", "EVENTS")],
            ),
            hdu(HduTypeCode::AsciiTable, ElementType::U8, 0, &[]),
            hdu(HduTypeCode::Unknown, ElementType::U8, 0, &[Card::new("HDUNAME", "odd")]),
        ],
        current: 0,
        closes: Arc::clone(&closes),
    };
    (FitsFile::new(backend), closes)
}

#[test]
fn kinds_follow_the_backend() {
    let (file, _) = scripted();
    assert_eq!(
        file.primary().unwrap().kind(),
        HduKind::Image {
            element: ElementType::F32,
            rank: 2
        }
    );
    assert_eq!(file.move_to(2).unwrap().kind(), HduKind::Table { ascii: false });
    assert_eq!(file.move_to(3).unwrap().kind(), HduKind::Table { ascii: true });
    assert_eq!(file.move_to(4).unwrap().kind(), HduKind::Any);
    assert!(matches!(file.move_to(5), Err(Error::NotFound(_))));
}

#[test]
fn names_resolve_through_the_backend() {
    let (file, _) = scripted();
    assert_eq!(file.hdu_by_name("events").unwrap().unwrap().num(), 2);
    assert_eq!(file.hdu_by_name("ODD").unwrap().unwrap().num(), 4);
    assert_eq!(file.hdu_by_name("BINTABLE").unwrap().unwrap().num(), 2);
    assert!(file.hdu_by_name("missing").unwrap().is_none());
}

#[test]
fn long_string_spans_continue_records() {
    let (file, _) = scripted();
    let hdu = file.move_to(3).unwrap();
    let text: String = (0..200).map(|i| (b'a' + (i % 26) as u8) as char).collect();
    hdu.write_key("LONGSTR", text.as_str(), Some("a long one")).unwrap();
    hdu.write_key("AFTER", 1i64, None).unwrap();

    let found = hdu.locate("LONGSTR").unwrap().unwrap();
    assert_eq!(found.position, 1);
    assert!(found.records >= 3);
    assert_eq!(found.card.value, Some(Value::String(text.clone())));
    assert_eq!(found.card.comment.as_deref(), Some("a long one"));
    assert_eq!(hdu.len().unwrap(), found.records + 1);

    let after = hdu.locate("AFTER").unwrap().unwrap();
    assert_eq!(after.position, found.records + 1);

    hdu.write_key("LONGSTR", "short", None).unwrap();
    assert_eq!(hdu.len().unwrap(), 2);
    assert_eq!(hdu.read_key::<String>("LONGSTR").unwrap(), "short");
    assert_eq!(
        hdu.card("LONGSTR").unwrap().unwrap().comment.as_deref(),
        Some("a long one")
    );
}

#[test]
fn update_is_idempotent_and_append_accumulates() {
    let (file, _) = scripted();
    let hdu = file.primary().unwrap();
    hdu.write_key("EXPTIME", 12.5, Some("[s] exposure")).unwrap();
    let once = hdu.header().unwrap();
    hdu.write_key("EXPTIME", 12.5, Some("[s] exposure")).unwrap();
    assert_eq!(hdu.header().unwrap(), once);
    assert_eq!(hdu.units("EXPTIME").unwrap().as_deref(), Some("s"));

    hdu.set("OBSNOTE", "first", None, SetMode::Append).unwrap();
    hdu.set("OBSNOTE", "second", None, SetMode::Append).unwrap();
    let notes: Vec<Value> = hdu
        .header()
        .unwrap()
        .into_iter()
        .filter(|c| c.name == "OBSNOTE")
        .filter_map(|c| c.value)
        .collect();
    assert_eq!(notes, vec![Value::from("first"), Value::from("second")]);
    assert_eq!(hdu.read_key::<String>("OBSNOTE").unwrap(), "first");
}

#[test]
fn undefined_is_not_absent() {
    let (file, _) = scripted();
    let hdu = file.primary().unwrap();
    hdu.write_key("BLANKED", Value::Undefined, Some("no value")).unwrap();
    let card = hdu.card("BLANKED").unwrap().unwrap();
    assert_eq!(card.value, Some(Value::Undefined));
    assert!(hdu.contains("BLANKED").unwrap());
    assert!(matches!(
        hdu.read_key::<i64>("BLANKED"),
        Err(Error::TypeMismatch { .. })
    ));
    assert!(!hdu.contains("MISSING").unwrap());
    assert!(matches!(hdu.read_key::<i64>("MISSING"), Err(Error::NotFound(_))));
}

#[test]
fn close_reaches_the_backend_once() {
    let (file, closes) = scripted();
    let hdu = file.move_to(2).unwrap();
    file.close().unwrap();
    file.close().unwrap();
    assert_eq!(closes.load(Ordering::SeqCst), 1);
    assert!(matches!(hdu.card("EXTNAME"), Err(Error::ClosedResource)));
    assert!(matches!(file.num_hdus(), Err(Error::ClosedResource)));
}
