//! On-disk behaviour of `MemoryFits` through the `FitsFile` handle.

use std::path::Path;

use fitshdu::layout;
use fitshdu::{Card, ElementType, Error, FitsFile, HduKind, MemoryFits, Value, BLOCK_SIZE};

fn create_sample(path: &Path) {
    let mut fits = MemoryFits::create(path).open().unwrap();
    let mut cards = layout::image_cards(16, &[3, 2]).unwrap();
    cards.push(Card::new("EXTNAME", "SCI"));
    cards.push(Card::new("BZERO", 32768.0));
    fits.append_hdu(&cards, 12).unwrap();
    let mut cards = layout::table_cards(false, 4, 5, 1);
    cards.push(Card::new("EXTNAME", "EVENTS"));
    fits.append_hdu(&cards, 20).unwrap();
    fits.flush().unwrap();
}

#[test]
fn create_edit_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("edit.fits");
    create_sample(&path);

    let file = FitsFile::edit(&path).unwrap();
    let sci = file.hdu_by_name("sci").unwrap().unwrap();
    assert_eq!(
        sci.kind(),
        HduKind::Image {
            element: ElementType::U16,
            rank: 2
        }
    );
    sci.write_key("OBJECT", "M31", Some("target")).unwrap();
    sci.write_key("EXPTIME", 300i64, Some("[s] exposure")).unwrap();
    sci.append_history("flat fielded").unwrap();
    file.close().unwrap();

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(bytes.len() % BLOCK_SIZE, 0);

    let file = FitsFile::open(&path).unwrap();
    assert_eq!(file.num_hdus().unwrap(), 3);
    let sci = file.move_to(2).unwrap();
    assert_eq!(sci.read_key::<String>("OBJECT").unwrap(), "M31");
    assert_eq!(sci.read_key::<i64>("EXPTIME").unwrap(), 300);
    assert_eq!(sci.units("EXPTIME").unwrap().as_deref(), Some("s"));
    let history: Vec<Card> = sci
        .header()
        .unwrap()
        .into_iter()
        .filter(|c| c.name == "HISTORY")
        .collect();
    assert_eq!(history, vec![Card::history("flat fielded")]);

    let events = file.move_to(3).unwrap();
    assert_eq!(events.kind(), HduKind::Table { ascii: false });
    assert_eq!(events.read_key::<i64>("NAXIS2").unwrap(), 5);
}

#[test]
fn read_only_rejects_writes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ro.fits");
    create_sample(&path);
    let before = std::fs::read(&path).unwrap();

    let file = FitsFile::open(&path).unwrap();
    let primary = file.primary().unwrap();
    assert!(matches!(
        primary.write_key("OBSERVER", "nobody", None),
        Err(Error::ReadOnly)
    ));
    assert!(matches!(primary.delete("EXTEND"), Err(Error::ReadOnly)));
    file.close().unwrap();

    assert_eq!(std::fs::read(&path).unwrap(), before);
}

#[test]
fn create_refuses_to_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("exists.fits");
    create_sample(&path);

    match MemoryFits::create(&path).open() {
        Err(Error::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::AlreadyExists),
        other => panic!("expected AlreadyExists, got {other:?}"),
    }

    let fits = MemoryFits::create(&path).overwrite().open().unwrap();
    drop(fits);
    let file = FitsFile::open(&path).unwrap();
    assert_eq!(file.num_hdus().unwrap(), 1);
}

#[test]
fn dropping_the_handle_flushes_edits() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("drop.fits");
    create_sample(&path);

    {
        let file = FitsFile::edit(&path).unwrap();
        let primary = file.primary().unwrap();
        primary.write_key("DATE-OBS", "2024-03-01", None).unwrap();
    }

    let file = FitsFile::open(&path).unwrap();
    let card = file.primary().unwrap().card("date-obs").unwrap().unwrap();
    assert_eq!(card.value, Some(Value::from("2024-03-01")));
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        FitsFile::open(dir.path().join("absent.fits")),
        Err(Error::Io(_))
    ));
}
