//! Entrées de répertoire FAT32 (format court 8.3).
//!
//! On ne gère pas les Long File Names (LFN) : seules les entrées
//! “courtes” de 32 octets sont décodées, encodées et recherchées. Une
//! entrée LFN rencontrée au scan est simplement ignorée.

use chrono::{DateTime, Datelike, Local, Timelike};

/// Bit d’attribut : répertoire.
pub const ATTR_DIRECTORY: u8 = 0x10;
/// Bit d’attribut : archive (fichier classique).
pub const ATTR_ARCHIVE: u8 = 0x20;
/// Masque d’une entrée de continuation LFN, à sauter au scan.
pub const ATTR_LONG_NAME: u8 = 0x0F;

/// Taille d’une entrée de répertoire sur le disque.
pub const DIR_ENTRY_SIZE: usize = 32;

/// Premier octet de nom marquant la fin du répertoire.
pub const NAME_END_OF_DIR: u8 = 0x00;
/// Premier octet de nom marquant une entrée supprimée (slot réutilisable).
pub const NAME_DELETED: u8 = 0xE5;

/// Attributs FAT d’une entrée de répertoire.
///
/// Les bits viennent directement du champ `ATTR` (offset 11).
#[derive(Debug, Clone, Copy)]
pub struct Attributes {
    /// Fichier en lecture seule.
    pub read_only: bool,
    /// Fichier caché.
    pub hidden: bool,
    /// Fichier système.
    pub system: bool,
    /// Volume ID (étiquette de volume).
    pub volume_id: bool,
    /// Répertoire.
    pub directory: bool,
    /// Archive (fichier classique).
    pub archive: bool,
}

impl Attributes {
    /// Construit les attributs à partir de l'octet brut.
    pub fn from_byte(b: u8) -> Self {
        Self {
            read_only: b & 0x01 != 0,
            hidden: b & 0x02 != 0,
            system: b & 0x04 != 0,
            volume_id: b & 0x08 != 0,
            directory: b & ATTR_DIRECTORY != 0,
            archive: b & ATTR_ARCHIVE != 0,
        }
    }
}

/// Entrée de répertoire FAT32 décodée (nom court 8.3).
///
/// Exemple: `HELLO.TXT`, `DOCS`, `A.BIN`.
#[derive(Debug, Clone)]
pub struct DirEntry {
    /// Nom court reconstitué (ex: `HELLO.TXT`).
    pub name: String,
    /// Attributs FAT.
    pub attrs: Attributes,
    /// Premier cluster de la chaîne (0 pour un fichier vide).
    pub first_cluster: u32,
    /// Taille du fichier en octets (0 pour un répertoire).
    pub size: u32,
}

impl DirEntry {
    /// Parse une entrée de 32 octets.
    ///
    /// Retourne `None` si:
    /// - l’entrée est libre (`0x00`) ou supprimée (`0xE5`)
    /// - l’entrée est une continuation LFN (attr `0x0F`)
    /// - l’entrée est un Volume ID
    pub fn parse(entry: &[u8]) -> Option<Self> {
        if entry.len() < DIR_ENTRY_SIZE {
            return None;
        }

        if entry[0] == NAME_END_OF_DIR || entry[0] == NAME_DELETED {
            return None;
        }

        if entry[11] & ATTR_LONG_NAME == ATTR_LONG_NAME {
            return None;
        }

        let attrs = Attributes::from_byte(entry[11]);
        if attrs.volume_id {
            return None;
        }

        let name = decode_ascii_trim(&entry[0..8]);
        let ext = decode_ascii_trim(&entry[8..11]);

        let full_name = if !ext.is_empty() {
            let mut s = String::with_capacity(name.len() + 1 + ext.len());
            s.push_str(&name);
            s.push('.');
            s.push_str(&ext);
            s
        } else {
            name
        };

        let first_cluster_high = u16::from_le_bytes([entry[20], entry[21]]) as u32;
        let first_cluster_low = u16::from_le_bytes([entry[26], entry[27]]) as u32;
        let first_cluster = (first_cluster_high << 16) | first_cluster_low;

        let size = u32::from_le_bytes([entry[28], entry[29], entry[30], entry[31]]);

        Some(Self {
            name: full_name,
            attrs,
            first_cluster,
            size,
        })
    }

    /// Indique si l’entrée est un répertoire.
    pub fn is_dir(&self) -> bool {
        self.attrs.directory
    }

    /// Indique si l’entrée est un fichier.
    pub fn is_file(&self) -> bool {
        !self.attrs.directory
    }
}

/// Encode un nom en format court 8.3 : 11 octets, majuscules, complétés
/// par des espaces, sans point stocké.
///
/// Exemples :
/// - `"readme.txt"` -> `"README  TXT"`
/// - `"a"`          -> `"A          "`
///
/// La base est coupée à 8 octets et l’extension à 3 : on tronque en
/// silence, on ne rejette jamais. Pas de détection de collision.
/// `"."` et `".."` gardent leur forme littérale, telle que `mkdir` la
/// stocke dans chaque nouveau répertoire.
pub fn to_short_name(name: &str) -> [u8; 11] {
    let mut short = [b' '; 11];

    if name == "." || name == ".." {
        for (i, b) in name.bytes().enumerate() {
            short[i] = b;
        }
        return short;
    }

    let (base, ext) = match name.rfind('.') {
        Some(dot) => (&name[..dot], &name[dot + 1..]),
        None => (name, ""),
    };

    for (i, b) in base.bytes().take(8).enumerate() {
        short[i] = b.to_ascii_uppercase();
    }
    for (i, b) in ext.bytes().take(3).enumerate() {
        short[8 + i] = b.to_ascii_uppercase();
    }

    short
}

/// Construit l’entrée de 32 octets prête à écrire dans un répertoire.
///
/// Les trois horodatages (création, écriture, dernier accès) sont pris
/// sur `now`, au format FAT compacté.
pub fn encode_entry(
    short_name: &[u8; 11],
    attr: u8,
    first_cluster: u32,
    size: u32,
    now: &DateTime<Local>,
) -> [u8; DIR_ENTRY_SIZE] {
    let mut e = [0u8; DIR_ENTRY_SIZE];

    let time = fat_time(now).to_le_bytes();
    let date = fat_date(now).to_le_bytes();
    let hi = ((first_cluster >> 16) as u16).to_le_bytes();
    let lo = ((first_cluster & 0xFFFF) as u16).to_le_bytes();

    e[0..11].copy_from_slice(short_name);
    e[11] = attr;
    // NTRes et dixièmes de seconde de création restent à 0.
    e[14..16].copy_from_slice(&time); // heure de création
    e[16..18].copy_from_slice(&date); // date de création
    e[18..20].copy_from_slice(&date); // date de dernier accès
    e[20..22].copy_from_slice(&hi);
    e[22..24].copy_from_slice(&time); // heure d’écriture
    e[24..26].copy_from_slice(&date); // date d’écriture
    e[26..28].copy_from_slice(&lo);
    e[28..32].copy_from_slice(&size.to_le_bytes());

    e
}

/// Heure FAT compactée : `(heure << 11) | (minute << 5) | (seconde / 2)`.
pub fn fat_time(t: &DateTime<Local>) -> u16 {
    ((t.hour() as u16) << 11) | ((t.minute() as u16) << 5) | (t.second() as u16 / 2)
}

/// Date FAT compactée : `((année - 1980) << 9) | (mois << 5) | jour`.
pub fn fat_date(t: &DateTime<Local>) -> u16 {
    (((t.year() - 1980) as u16) << 9) | ((t.month() as u16) << 5) | t.day() as u16
}

/// Décodage ASCII simple en supprimant les espaces de fin (padding FAT 8.3).
fn decode_ascii_trim(bytes: &[u8]) -> String {
    let mut end = bytes.len();
    while end > 0 && bytes[end - 1] == b' ' {
        end -= 1;
    }

    let mut s = String::with_capacity(end);
    for &b in &bytes[..end] {
        s.push(b as char);
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn short_name_pads_and_uppercases() {
        assert_eq!(&to_short_name("readme.txt"), b"README  TXT");
        assert_eq!(&to_short_name("a"), b"A          ");
        assert_eq!(&to_short_name("DOCS"), b"DOCS       ");
    }

    #[test]
    fn short_name_truncates_long_parts() {
        assert_eq!(&to_short_name("verylongname.text"), b"VERYLONGTEX");
        assert_eq!(&to_short_name("exactly8.abc"), b"EXACTLY8ABC");
    }

    #[test]
    fn short_name_splits_on_last_dot() {
        assert_eq!(&to_short_name("a.b.c"), b"A.B     C  ");
    }

    #[test]
    fn short_name_keeps_dot_entries_literal() {
        assert_eq!(&to_short_name("."), b".          ");
        assert_eq!(&to_short_name(".."), b"..         ");
    }

    #[test]
    fn fat_timestamps_pack_fields() {
        let t = Local.with_ymd_and_hms(2026, 8, 28, 13, 45, 31).unwrap();
        assert_eq!(fat_time(&t), (13 << 11) | (45 << 5) | 15);
        assert_eq!(fat_date(&t), ((2026 - 1980) << 9) | (8 << 5) | 28);
    }

    #[test]
    fn encode_then_parse_directory_entry() {
        let now = Local.with_ymd_and_hms(2026, 8, 28, 10, 0, 0).unwrap();
        let raw = encode_entry(&to_short_name("docs"), ATTR_DIRECTORY, 0x0001_0003, 0, &now);

        let e = DirEntry::parse(&raw).expect("entrée rejetée");
        assert_eq!(e.name, "DOCS");
        assert!(e.is_dir());
        assert_eq!(e.first_cluster, 0x0001_0003);
        assert_eq!(e.size, 0);
    }

    #[test]
    fn parse_skips_free_deleted_and_lfn() {
        let now = Local.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut raw = encode_entry(&to_short_name("a.txt"), ATTR_ARCHIVE, 0, 0, &now);

        raw[0] = NAME_END_OF_DIR;
        assert!(DirEntry::parse(&raw).is_none());

        raw[0] = NAME_DELETED;
        assert!(DirEntry::parse(&raw).is_none());

        raw[0] = b'A';
        raw[11] = ATTR_LONG_NAME;
        assert!(DirEntry::parse(&raw).is_none());
    }
}
