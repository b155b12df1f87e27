//! Émulateur FAT32 sur une image disque à plat.
//!
//! Ce crate manipule un volume FAT32 directement dans un fichier image,
//! comme le ferait un vrai driver. Il permet :
//! - de formater l’image (secteur de boot, FAT miroir, racine),
//! - de lister et de naviguer dans les répertoires (`ls`, `cd`),
//! - de créer des répertoires et des fichiers vides (`mkdir`, `touch`),
//!   en modifiant réellement les secteurs de l’image.
//!
//! Notes importantes :
//! - Noms courts FAT uniquement (format 8.3). Pas de LFN.
//! - Pas de lecture/écriture de contenu : `touch` crée un fichier vide.
//! - Un répertoire tient dans un seul cluster (128 entrées à 8 secteurs
//!   par cluster) et ne grandit jamais ; au-delà c’est [`FatError::DirectoryFull`].
//! - Tout accès au support passe par [`BlockDevice`] et remonte un
//!   [`Result`] : aucune erreur d’E/S n’est avalée en silence.

use std::fmt;
use std::io;

use chrono::Local;
use log::{debug, trace};

mod block;
mod boot_sector;
mod dir_entry;

pub use block::{BlockDevice, FileDisk, RamDisk, SECTOR_SIZE};
pub use boot_sector::BootSector;
pub use dir_entry::{Attributes, DirEntry};

use dir_entry::{
    encode_entry, to_short_name, ATTR_ARCHIVE, ATTR_DIRECTORY, ATTR_LONG_NAME, DIR_ENTRY_SIZE,
    NAME_DELETED, NAME_END_OF_DIR,
};

/// Erreurs possibles lors de l’accès à un volume FAT32.
#[derive(Debug)]
pub enum FatError {
    /// Erreur d’entrée/sortie sur le fichier image.
    Io(io::Error),
    /// Accès à un secteur au-delà de la fin de l’image.
    ImageTruncated,
    /// Le secteur 0 n’est pas un secteur de boot FAT32 valide.
    NotFat32,
    /// Opération demandée alors qu’aucun volume valide n’est monté.
    NotFormatted,
    /// Numéro de cluster invalide (ex: < 2).
    InvalidCluster,
    /// Le chemin ne correspond à aucune entrée connue.
    PathNotFound,
    /// Le chemin traverse un fichier comme si c’était un répertoire.
    NotADirectory,
    /// Plus aucun cluster libre dans la FAT (disque plein).
    NoSpaceLeft,
    /// Plus aucun slot libre dans le cluster du répertoire.
    DirectoryFull,
}

impl fmt::Display for FatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FatError::Io(e) => write!(f, "erreur d'E/S sur l'image: {e}"),
            FatError::ImageTruncated => write!(f, "lecture/écriture au-delà de l'image (image tronquée ?)"),
            FatError::NotFat32 => write!(f, "l'image ne contient pas de volume FAT32 valide"),
            FatError::NotFormatted => write!(f, "volume non formaté (lancez `format`)"),
            FatError::InvalidCluster => write!(f, "numéro de cluster invalide"),
            FatError::PathNotFound => write!(f, "chemin introuvable"),
            FatError::NotADirectory => write!(f, "pas un répertoire"),
            FatError::NoSpaceLeft => write!(f, "plus d'espace libre sur le disque"),
            FatError::DirectoryFull => write!(f, "répertoire plein (un seul cluster par répertoire)"),
        }
    }
}

impl std::error::Error for FatError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FatError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for FatError {
    fn from(e: io::Error) -> Self {
        FatError::Io(e)
    }
}

/// Entrée de FAT : cluster libre.
const FAT_FREE: u32 = 0x0000_0000;
/// Entrée de FAT du cluster 0 : descripteur de média.
const FAT_MEDIA: u32 = 0x0FFF_FFF8;
/// Valeur “End Of Chain” en FAT32.
const FAT_EOC: u32 = 0x0FFF_FFFF;
/// Seuls les 28 bits bas d’une entrée de FAT sont significatifs.
const FAT_ENTRY_MASK: u32 = 0x0FFF_FFFF;

/// Volume monté : géométrie validée plus répertoire de travail.
struct Volume {
    boot: BootSector,
    cwd_cluster: u32,
    cwd_path: String,
}

/// Session FAT32 sur un support bloc.
///
/// La session possède le support et tout l’état de navigation : pas de
/// globale cachée. Tant qu’aucun volume valide n’est monté (secteur de
/// boot invalide), seule [`Fat32Fs::format`] est acceptée ; les autres
/// opérations répondent [`FatError::NotFormatted`].
pub struct Fat32Fs<D: BlockDevice> {
    disk: D,
    volume: Option<Volume>,
}

impl<D: BlockDevice> Fat32Fs<D> {
    /// Construit une session non montée sur `disk`.
    pub fn new(disk: D) -> Self {
        Self { disk, volume: None }
    }

    /// Tente de monter le volume depuis le secteur 0.
    ///
    /// Retourne [`FatError::NotFat32`] si le secteur de boot ne valide
    /// pas : l’image existe mais n’est pas formatée, et la session reste
    /// non montée jusqu’à un `format`.
    pub fn mount(&mut self) -> Result<(), FatError> {
        let mut sector0 = [0u8; SECTOR_SIZE];
        self.disk.read_sector(0, &mut sector0)?;

        match BootSector::parse(&sector0) {
            Some(boot) => {
                debug!(
                    "volume monté: {} secteurs, FAT de {} secteurs x{}",
                    boot.total_sectors, boot.sectors_per_fat, boot.num_fats
                );
                self.volume = Some(Volume {
                    boot,
                    cwd_cluster: boot.root_cluster,
                    cwd_path: String::from("/"),
                });
                Ok(())
            }
            None => {
                self.volume = None;
                Err(FatError::NotFat32)
            }
        }
    }

    /// Indique si un volume valide est monté.
    pub fn is_formatted(&self) -> bool {
        self.volume.is_some()
    }

    /// Chemin du répertoire de travail, si un volume est monté.
    pub fn current_path(&self) -> Option<&str> {
        self.volume.as_ref().map(|v| v.cwd_path.as_str())
    }

    /// Cluster du répertoire de travail, si un volume est monté.
    pub fn current_cluster(&self) -> Option<u32> {
        self.volume.as_ref().map(|v| v.cwd_cluster)
    }

    /// (Re)formate entièrement le volume.
    ///
    /// Écrit un secteur de boot neuf, remet à zéro les deux copies de la
    /// FAT, pose les entrées réservées (cluster 0 = média, cluster 1 =
    /// fin de chaîne) et marque le cluster racine fin de chaîne pour
    /// qu’il ne soit jamais rendu par l’allocateur. Le cluster racine est
    /// vidé et le répertoire de travail revient à `/`. Idempotent.
    pub fn format(&mut self) -> Result<(), FatError> {
        let boot = BootSector::build(self.disk.sector_count());
        debug!(
            "formatage: {} secteurs, {} clusters, FAT de {} secteurs",
            boot.total_sectors,
            boot.max_cluster().saturating_sub(1),
            boot.sectors_per_fat
        );

        self.disk.write_sector(0, &boot.to_bytes())?;

        let zero = [0u8; SECTOR_SIZE];
        trace!("remise à zéro des copies de la FAT");
        for sector in boot.fat_start_sector()..boot.data_start_sector() {
            self.disk.write_sector(sector, &zero)?;
        }

        self.set_fat_entry(&boot, 0, FAT_MEDIA)?;
        self.set_fat_entry(&boot, 1, FAT_EOC)?;
        // La racine aussi est fin de chaîne : sinon l’allocateur pourrait
        // redistribuer le cluster 2.
        self.set_fat_entry(&boot, boot.root_cluster, FAT_EOC)?;

        trace!("remise à zéro du cluster racine");
        let first = boot.cluster_to_sector(boot.root_cluster)?;
        for s in 0..boot.sectors_per_cluster as u32 {
            self.disk.write_sector(first + s, &zero)?;
        }

        self.volume = Some(Volume {
            boot,
            cwd_cluster: boot.root_cluster,
            cwd_path: String::from("/"),
        });
        Ok(())
    }

    /// Liste un répertoire : celui de `path`, ou le répertoire courant
    /// si `path` est `None`.
    pub fn list(&mut self, path: Option<&str>) -> Result<Vec<DirEntry>, FatError> {
        let (boot, cwd) = self.mounted()?;
        let cluster = match path {
            Some(p) => self.resolve_cluster(&boot, cwd, p)?,
            None => cwd,
        };
        self.list_entries(&boot, cluster)
    }

    /// Change le répertoire de travail.
    ///
    /// Le chemin stocké est normalisé et se termine toujours par `/`
    /// (`/` tout court pour la racine). `..` remonte au vrai parent, via
    /// l’entrée `..` que `mkdir` écrit dans chaque répertoire ; à la
    /// racine, `..` reste à la racine.
    pub fn change_dir(&mut self, path: &str) -> Result<(), FatError> {
        let (boot, cwd) = self.mounted()?;
        let cluster = self.resolve_cluster(&boot, cwd, path)?;

        if let Some(vol) = self.volume.as_mut() {
            vol.cwd_path = normalize_path(&vol.cwd_path, path);
            vol.cwd_cluster = cluster;
            trace!("cd -> {} (cluster {})", vol.cwd_path, cluster);
        }
        Ok(())
    }

    /// Crée un sous-répertoire `name` dans le répertoire courant.
    ///
    /// Alloue un cluster, le marque fin de chaîne, insère l’entrée dans
    /// le répertoire courant, puis écrit `.` et `..` dans le nouveau
    /// cluster. Si l’insertion échoue (répertoire plein), le cluster
    /// alloué est rendu libre avant de remonter l’erreur.
    pub fn make_dir(&mut self, name: &str) -> Result<(), FatError> {
        let (boot, parent) = self.mounted()?;

        let cluster = self.find_free_cluster(&boot)?;
        self.set_fat_entry(&boot, cluster, FAT_EOC)?;

        let now = Local::now();
        let raw = encode_entry(&to_short_name(name), ATTR_DIRECTORY, cluster, 0, &now);
        if let Err(e) = self.insert_entry(&boot, parent, &raw) {
            self.set_fat_entry(&boot, cluster, FAT_FREE)?;
            return Err(e);
        }

        // Premier secteur du nouveau répertoire : `.` (lui-même) puis
        // `..` (le parent), le reste du cluster à zéro.
        let mut sector = [0u8; SECTOR_SIZE];
        let dot = encode_entry(&to_short_name("."), ATTR_DIRECTORY, cluster, 0, &now);
        let dotdot = encode_entry(&to_short_name(".."), ATTR_DIRECTORY, parent, 0, &now);
        sector[0..DIR_ENTRY_SIZE].copy_from_slice(&dot);
        sector[DIR_ENTRY_SIZE..2 * DIR_ENTRY_SIZE].copy_from_slice(&dotdot);

        let first = boot.cluster_to_sector(cluster)?;
        self.disk.write_sector(first, &sector)?;
        let zero = [0u8; SECTOR_SIZE];
        for s in 1..boot.sectors_per_cluster as u32 {
            self.disk.write_sector(first + s, &zero)?;
        }

        debug!("mkdir {name} -> cluster {cluster}");
        Ok(())
    }

    /// Crée un fichier vide `name` dans le répertoire courant.
    ///
    /// Aucune allocation de cluster : taille 0, premier cluster 0.
    pub fn create_file(&mut self, name: &str) -> Result<(), FatError> {
        let (boot, cwd) = self.mounted()?;

        let now = Local::now();
        let raw = encode_entry(&to_short_name(name), ATTR_ARCHIVE, 0, 0, &now);
        self.insert_entry(&boot, cwd, &raw)?;

        debug!("touch {name}");
        Ok(())
    }

    // ---------- internes : session ----------

    fn mounted(&self) -> Result<(BootSector, u32), FatError> {
        match &self.volume {
            Some(v) => Ok((v.boot, v.cwd_cluster)),
            None => Err(FatError::NotFormatted),
        }
    }

    // ---------- internes : FAT ----------

    /// Lit l’entrée de FAT du cluster, masquée sur 28 bits.
    fn fat_entry(&mut self, boot: &BootSector, cluster: u32) -> Result<u32, FatError> {
        let (sector, off) = fat_position(boot, cluster);
        let mut buf = [0u8; SECTOR_SIZE];
        self.disk.read_sector(sector, &mut buf)?;
        let raw = u32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]]);
        Ok(raw & FAT_ENTRY_MASK)
    }

    /// Écrit l’entrée de FAT du cluster, dans chaque copie de la FAT.
    ///
    /// Le secteur modifié est recopié à l’identique dans le miroir
    /// (`secteur + sectors_per_fat` pour la deuxième copie) : les copies
    /// restent octet pour octet identiques après chaque mutation.
    fn set_fat_entry(&mut self, boot: &BootSector, cluster: u32, value: u32) -> Result<(), FatError> {
        let (sector, off) = fat_position(boot, cluster);
        let mut buf = [0u8; SECTOR_SIZE];
        self.disk.read_sector(sector, &mut buf)?;
        buf[off..off + 4].copy_from_slice(&(value & FAT_ENTRY_MASK).to_le_bytes());

        for copy in 0..boot.num_fats as u32 {
            self.disk.write_sector(sector + copy * boot.sectors_per_fat, &buf)?;
        }
        Ok(())
    }

    /// Premier cluster libre, en ordre croissant à partir de 2.
    ///
    /// Scan linéaire de la FAT, secteur par secteur ; pas de cache de
    /// clusters libres. FAT épuisée = disque plein.
    fn find_free_cluster(&mut self, boot: &BootSector) -> Result<u32, FatError> {
        let mut buf = [0u8; SECTOR_SIZE];
        let mut loaded: Option<u32> = None;

        for cluster in 2..=boot.max_cluster() {
            let (sector, off) = fat_position(boot, cluster);
            if loaded != Some(sector) {
                self.disk.read_sector(sector, &mut buf)?;
                loaded = Some(sector);
            }
            let raw = u32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]]);
            if raw & FAT_ENTRY_MASK == FAT_FREE {
                return Ok(cluster);
            }
        }

        Err(FatError::NoSpaceLeft)
    }

    // ---------- internes : répertoires ----------

    /// Énumère les entrées d’un répertoire (un cluster).
    ///
    /// Le scan s’arrête net sur un premier octet de nom `0x00` (fin de
    /// répertoire) ; les entrées supprimées, LFN et Volume ID sont
    /// sautées.
    fn list_entries(&mut self, boot: &BootSector, dir_cluster: u32) -> Result<Vec<DirEntry>, FatError> {
        let first = boot.cluster_to_sector(dir_cluster)?;
        let mut entries = Vec::new();
        let mut buf = [0u8; SECTOR_SIZE];

        for s in 0..boot.sectors_per_cluster as u32 {
            self.disk.read_sector(first + s, &mut buf)?;
            for chunk in buf.chunks(DIR_ENTRY_SIZE) {
                if chunk[0] == NAME_END_OF_DIR {
                    return Ok(entries);
                }
                if let Some(e) = DirEntry::parse(chunk) {
                    entries.push(e);
                }
            }
        }

        Ok(entries)
    }

    /// Écrit `raw` dans le premier slot libre ou réutilisable du
    /// répertoire.
    ///
    /// Contrairement à l’énumération, ce scan ne s’arrête PAS sur `0x00` :
    /// un slot supprimé (`0xE5`) situé avant la fin du répertoire doit
    /// pouvoir être réutilisé. Un répertoire ne grandit jamais au-delà de
    /// son cluster.
    fn insert_entry(
        &mut self,
        boot: &BootSector,
        dir_cluster: u32,
        raw: &[u8; DIR_ENTRY_SIZE],
    ) -> Result<(), FatError> {
        let first = boot.cluster_to_sector(dir_cluster)?;
        let mut buf = [0u8; SECTOR_SIZE];

        for s in 0..boot.sectors_per_cluster as u32 {
            self.disk.read_sector(first + s, &mut buf)?;
            for slot in 0..SECTOR_SIZE / DIR_ENTRY_SIZE {
                let off = slot * DIR_ENTRY_SIZE;
                if buf[off] == NAME_END_OF_DIR || buf[off] == NAME_DELETED {
                    buf[off..off + DIR_ENTRY_SIZE].copy_from_slice(raw);
                    self.disk.write_sector(first + s, &buf)?;
                    return Ok(());
                }
            }
        }

        Err(FatError::DirectoryFull)
    }

    /// Cherche `short` (11 octets bruts) parmi les entrées du répertoire.
    ///
    /// Retourne le premier cluster et l’octet d’attributs de l’entrée.
    fn find_raw_entry(
        &mut self,
        boot: &BootSector,
        dir_cluster: u32,
        short: &[u8; 11],
    ) -> Result<Option<(u32, u8)>, FatError> {
        let first = boot.cluster_to_sector(dir_cluster)?;
        let mut buf = [0u8; SECTOR_SIZE];

        for s in 0..boot.sectors_per_cluster as u32 {
            self.disk.read_sector(first + s, &mut buf)?;
            for chunk in buf.chunks(DIR_ENTRY_SIZE) {
                if chunk[0] == NAME_END_OF_DIR {
                    return Ok(None);
                }
                if chunk[0] == NAME_DELETED || chunk[11] & ATTR_LONG_NAME == ATTR_LONG_NAME {
                    continue;
                }
                if &chunk[0..11] == short {
                    let hi = u16::from_le_bytes([chunk[20], chunk[21]]) as u32;
                    let lo = u16::from_le_bytes([chunk[26], chunk[27]]) as u32;
                    return Ok(Some(((hi << 16) | lo, chunk[11])));
                }
            }
        }

        Ok(None)
    }

    // ---------- internes : résolution de chemin ----------

    /// Résout `path` en numéro de cluster de répertoire.
    ///
    /// Un chemin absolu part de la racine, un relatif de `start`. Chaque
    /// segment est converti en nom court puis comparé aux 11 octets bruts
    /// des entrées portant l’attribut répertoire ; la comparaison est
    /// donc insensible à la casse. Segment introuvable = échec, sans
    /// nouvelle tentative.
    fn resolve_cluster(&mut self, boot: &BootSector, start: u32, path: &str) -> Result<u32, FatError> {
        let mut current = if path.starts_with('/') {
            boot.root_cluster
        } else {
            start
        };

        for segment in path.split('/').filter(|s| !s.is_empty()) {
            // La racine ne stocke pas d’entrées `.`/`..` : `.` y est un
            // non-mouvement et `..` y reste sur place.
            if segment == "." || (segment == ".." && current == boot.root_cluster) {
                continue;
            }

            let short = to_short_name(segment);
            let (cluster, attr) = self
                .find_raw_entry(boot, current, &short)?
                .ok_or(FatError::PathNotFound)?;
            if attr & ATTR_DIRECTORY == 0 {
                return Err(FatError::NotADirectory);
            }
            // Une entrée `..` pointant la racine peut stocker 0 (images
            // produites par d’autres outils).
            current = if cluster < 2 { boot.root_cluster } else { cluster };
        }

        Ok(current)
    }
}

/// Position d’une entrée de FAT : (secteur absolu dans la première FAT,
/// offset de l’entrée dans ce secteur).
fn fat_position(boot: &BootSector, cluster: u32) -> (u32, usize) {
    let byte = cluster as u64 * 4;
    let sector = boot.fat_start_sector() + (byte / SECTOR_SIZE as u64) as u32;
    (sector, (byte % SECTOR_SIZE as u64) as usize)
}

/// Normalise le chemin affiché après un `cd`.
///
/// Exemples :
/// - current="/", path="DOCS"        -> "/DOCS/"
/// - current="/DOCS/", path=".."     -> "/"
/// - current="/DOCS/", path="/A/B"   -> "/A/B/"
fn normalize_path(current: &str, path: &str) -> String {
    let mut components: Vec<&str> = Vec::new();

    if !path.starts_with('/') {
        for part in current.split('/') {
            push_component(&mut components, part);
        }
    }
    for part in path.split('/') {
        push_component(&mut components, part);
    }

    if components.is_empty() {
        String::from("/")
    } else {
        let mut result = String::from("/");
        result.push_str(&components.join("/"));
        result.push('/');
        result
    }
}

/// Ajoute un composant de chemin en gérant `.` et `..`.
fn push_component<'a>(components: &mut Vec<&'a str>, part: &'a str) {
    match part {
        "" | "." => {}
        ".." => {
            components.pop();
        }
        _ => components.push(part),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: usize = 1024 * 1024;

    fn formatted_fs(size_bytes: usize) -> Fat32Fs<RamDisk> {
        let mut fs = Fat32Fs::new(RamDisk::new(size_bytes));
        fs.format().expect("format failed");
        fs
    }

    fn free_cluster_count(fs: &mut Fat32Fs<RamDisk>) -> u32 {
        let (boot, _) = fs.mounted().unwrap();
        let mut n = 0;
        for cluster in 2..=boot.max_cluster() {
            if fs.fat_entry(&boot, cluster).unwrap() == FAT_FREE {
                n += 1;
            }
        }
        n
    }

    #[test]
    fn format_seeds_reserved_fat_entries_and_root() {
        let mut fs = formatted_fs(MIB);
        let (boot, cwd) = fs.mounted().unwrap();

        assert_eq!(cwd, 2);
        assert_eq!(fs.current_path(), Some("/"));
        assert_eq!(fs.fat_entry(&boot, 0).unwrap(), FAT_MEDIA);
        assert_eq!(fs.fat_entry(&boot, 1).unwrap(), FAT_EOC);
        // la racine est protégée de l'allocation
        assert_eq!(fs.fat_entry(&boot, 2).unwrap(), FAT_EOC);
        assert_eq!(fs.find_free_cluster(&boot).unwrap(), 3);
    }

    #[test]
    fn format_then_mount_round_trips() {
        let mut fs = formatted_fs(MIB);
        fs.volume = None;
        fs.mount().expect("le volume formaté devrait se monter");
        assert_eq!(fs.current_cluster(), Some(2));
    }

    #[test]
    fn reformat_wipes_previous_content() {
        let mut fs = formatted_fs(MIB);
        fs.make_dir("OLD").unwrap();
        fs.format().unwrap();

        assert!(fs.list(None).unwrap().is_empty());
        let (boot, _) = fs.mounted().unwrap();
        assert_eq!(fs.find_free_cluster(&boot).unwrap(), 3);
    }

    #[test]
    fn fat_copies_stay_identical_after_update() {
        let mut fs = formatted_fs(MIB);
        let (boot, _) = fs.mounted().unwrap();

        fs.set_fat_entry(&boot, 5, FAT_EOC).unwrap();
        fs.set_fat_entry(&boot, 130, 131).unwrap(); // entrée du 2e secteur de FAT

        for cluster in [5u32, 130] {
            let (sector, _) = fat_position(&boot, cluster);
            let mut primary = [0u8; SECTOR_SIZE];
            let mut mirror = [0u8; SECTOR_SIZE];
            fs.disk.read_sector(sector, &mut primary).unwrap();
            fs.disk
                .read_sector(sector + boot.sectors_per_fat, &mut mirror)
                .unwrap();
            assert_eq!(primary, mirror, "les copies de la FAT ont divergé");
        }
    }

    #[test]
    fn ls_on_fresh_root_is_empty() {
        let mut fs = formatted_fs(MIB);
        assert!(fs.list(None).unwrap().is_empty());
    }

    #[test]
    fn operations_rejected_until_formatted() {
        let mut fs = Fat32Fs::new(RamDisk::new(MIB));
        assert!(matches!(fs.mount(), Err(FatError::NotFat32)));
        assert!(!fs.is_formatted());

        assert!(matches!(fs.list(None), Err(FatError::NotFormatted)));
        assert!(matches!(fs.change_dir("/"), Err(FatError::NotFormatted)));
        assert!(matches!(fs.make_dir("A"), Err(FatError::NotFormatted)));
        assert!(matches!(fs.create_file("A"), Err(FatError::NotFormatted)));

        fs.format().unwrap();
        assert!(fs.list(None).unwrap().is_empty());
    }

    #[test]
    fn mkdir_writes_dot_entries_in_new_cluster() {
        let mut fs = formatted_fs(MIB);
        fs.make_dir("SUB").unwrap();

        let names: Vec<String> = fs
            .list(Some("SUB"))
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec![".", ".."]);
    }

    #[test]
    fn mkdir_cd_then_dotdot_returns_to_root() {
        let mut fs = formatted_fs(MIB);
        fs.make_dir("SUB").unwrap();

        fs.change_dir("SUB").unwrap();
        assert_ne!(fs.current_cluster(), Some(2));
        assert_eq!(fs.current_path(), Some("/SUB/"));

        fs.change_dir("..").unwrap();
        assert_eq!(fs.current_cluster(), Some(2));
        assert_eq!(fs.current_path(), Some("/"));
    }

    #[test]
    fn dotdot_climbs_to_true_parent_not_root() {
        let mut fs = formatted_fs(MIB);
        fs.make_dir("A").unwrap();
        fs.change_dir("A").unwrap();
        let a_cluster = fs.current_cluster().unwrap();
        fs.make_dir("B").unwrap();

        fs.change_dir("B").unwrap();
        fs.change_dir("..").unwrap();

        assert_eq!(fs.current_cluster(), Some(a_cluster));
        assert_eq!(fs.current_path(), Some("/A/"));
    }

    #[test]
    fn dotdot_at_root_stays_at_root() {
        let mut fs = formatted_fs(MIB);
        fs.change_dir("..").unwrap();
        assert_eq!(fs.current_cluster(), Some(2));
        assert_eq!(fs.current_path(), Some("/"));
    }

    #[test]
    fn resolve_absolute_and_relative_paths() {
        let mut fs = formatted_fs(MIB);
        fs.make_dir("A").unwrap();
        fs.change_dir("A").unwrap();
        fs.make_dir("B").unwrap();

        // absolu depuis n'importe où
        fs.change_dir("/A/B").unwrap();
        assert_eq!(fs.current_path(), Some("/A/B/"));

        // relatif avec remontée
        fs.change_dir("../..").unwrap();
        assert_eq!(fs.current_path(), Some("/"));
        assert_eq!(fs.current_cluster(), Some(2));
    }

    #[test]
    fn resolve_is_case_insensitive_on_short_names() {
        let mut fs = formatted_fs(MIB);
        fs.make_dir("DOCS").unwrap();
        fs.change_dir("docs").unwrap();
        assert_eq!(fs.current_path(), Some("/docs/"));

        let names: Vec<String> = fs.list(Some("/Docs")).unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec![".", ".."]);
    }

    #[test]
    fn cd_to_missing_path_changes_nothing() {
        let mut fs = formatted_fs(MIB);
        let err = fs.change_dir("NOPE").unwrap_err();
        assert!(matches!(err, FatError::PathNotFound));
        assert_eq!(fs.current_path(), Some("/"));
        assert_eq!(fs.current_cluster(), Some(2));
    }

    #[test]
    fn cd_through_a_file_is_not_a_directory() {
        let mut fs = formatted_fs(MIB);
        fs.create_file("A.TXT").unwrap();
        let err = fs.change_dir("A.TXT").unwrap_err();
        assert!(matches!(err, FatError::NotADirectory));
    }

    #[test]
    fn touch_creates_zero_length_file_without_allocation() {
        let mut fs = formatted_fs(MIB);
        let free_before = free_cluster_count(&mut fs);

        fs.create_file("A.TXT").unwrap();

        let entries = fs.list(None).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "A.TXT");
        assert!(entries[0].is_file());
        assert_eq!(entries[0].size, 0);
        assert_eq!(entries[0].first_cluster, 0);
        assert_eq!(free_cluster_count(&mut fs), free_before);
    }

    #[test]
    fn insert_reuses_deleted_slot_before_end_marker() {
        let mut fs = formatted_fs(MIB);
        fs.create_file("A.TXT").unwrap();
        fs.create_file("B.TXT").unwrap();

        // on marque A.TXT supprimé, à la main (pas d'opération rm ici)
        let (boot, _) = fs.mounted().unwrap();
        let first = boot.cluster_to_sector(2).unwrap();
        let mut buf = [0u8; SECTOR_SIZE];
        fs.disk.read_sector(first, &mut buf).unwrap();
        buf[0] = NAME_DELETED;
        fs.disk.write_sector(first, &buf).unwrap();

        fs.create_file("C.TXT").unwrap();

        let entries = fs.list(None).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        // C.TXT a repris le slot de A.TXT, avant B.TXT
        assert_eq!(names, vec!["C.TXT", "B.TXT"]);
    }

    #[test]
    fn mkdir_exhausts_fat_without_leaking_clusters() {
        // 64 KiB: 128 secteurs, data à partir du secteur 34, soit 11
        // clusters utilisables dont la racine -> 10 mkdir possibles.
        let mut fs = formatted_fs(64 * 1024);
        let mut created = 0;
        loop {
            match fs.make_dir(&format!("D{created}")) {
                Ok(()) => created += 1,
                Err(FatError::NoSpaceLeft) => break,
                Err(e) => panic!("erreur inattendue: {e}"),
            }
        }
        assert_eq!(created, 10);
        assert_eq!(free_cluster_count(&mut fs), 0);

        // l'échec ne doit rien avoir alloué
        assert!(matches!(fs.make_dir("PLUS"), Err(FatError::NoSpaceLeft)));
        assert_eq!(free_cluster_count(&mut fs), 0);
    }

    #[test]
    fn full_directory_rejects_touch_and_rolls_back_mkdir() {
        let mut fs = formatted_fs(MIB);

        // 8 secteurs par cluster, 16 entrées par secteur = 128 slots
        for i in 0..128 {
            fs.create_file(&format!("F{i}.TXT")).unwrap();
        }
        assert!(matches!(fs.create_file("TROP.TXT"), Err(FatError::DirectoryFull)));

        // mkdir doit rendre son cluster quand l'insertion échoue
        let free_before = free_cluster_count(&mut fs);
        assert!(matches!(fs.make_dir("TROP"), Err(FatError::DirectoryFull)));
        assert_eq!(free_cluster_count(&mut fs), free_before);
    }

    #[test]
    fn chemin_normalise_toujours_termine_par_slash() {
        assert_eq!(normalize_path("/", "DOCS"), "/DOCS/");
        assert_eq!(normalize_path("/DOCS/", "SUB"), "/DOCS/SUB/");
        assert_eq!(normalize_path("/DOCS/SUB/", ".."), "/DOCS/");
        assert_eq!(normalize_path("/DOCS/", "/A/B"), "/A/B/");
        assert_eq!(normalize_path("/DOCS/", "./SUB"), "/DOCS/SUB/");
        assert_eq!(normalize_path("/", ".."), "/");
    }
}
