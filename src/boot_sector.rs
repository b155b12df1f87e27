//! Secteur de boot FAT32 (BPB).
//!
//! Le secteur 0 de l’image porte toute la géométrie du volume :
//! taille de secteur, taille de cluster, zone réservée, taille et nombre
//! de copies de la FAT, cluster racine. On le parse, on le valide, et au
//! formatage on le reconstruit octet par octet.

use chrono::Local;
use log::debug;

use crate::block::SECTOR_SIZE;
use crate::FatError;

/// Signature obligatoire en fin de secteur de boot.
pub const BOOT_SIGNATURE: u16 = 0xAA55;

/// Tag de type de système de fichiers, offset 82 du secteur de boot.
const FS_TYPE_TAG: &[u8; 8] = b"FAT32   ";

/// Paramètres du secteur de boot d’un volume FAT32.
///
/// On ne garde que les champs qui varient d’un volume à l’autre ;
/// les champs fixes (jump, OEM, signature…) sont régénérés par
/// [`BootSector::to_bytes`].
#[derive(Debug, Clone, Copy)]
pub struct BootSector {
    /// Octets par secteur. Toujours 512 ici.
    pub bytes_per_sector: u16,
    /// Secteurs par cluster.
    pub sectors_per_cluster: u8,
    /// Secteurs réservés avant la première FAT.
    pub reserved_sectors: u16,
    /// Nombre de copies de la FAT (2 au formatage).
    pub num_fats: u8,
    /// Descripteur de média (0xF8 = disque fixe).
    pub media: u8,
    /// Nombre total de secteurs du volume.
    pub total_sectors: u32,
    /// Taille d’une copie de FAT, en secteurs.
    pub sectors_per_fat: u32,
    /// Premier cluster du répertoire racine (2 au formatage).
    pub root_cluster: u32,
    /// Identifiant de volume (heure de formatage).
    pub volume_id: u32,
    /// Étiquette de volume, 11 octets complétés par des espaces.
    pub volume_label: [u8; 11],
}

impl BootSector {
    /// Parse et valide le secteur 0.
    ///
    /// Retourne `None` tant que la signature 0xAA55 et le tag `FAT32`
    /// ne sont pas tous les deux présents, ou si la géométrie est
    /// incohérente. Fonction pure, sans effet de bord.
    pub fn parse(sector: &[u8; SECTOR_SIZE]) -> Option<Self> {
        let signature = u16::from_le_bytes([sector[510], sector[511]]);
        if signature != BOOT_SIGNATURE {
            debug!("signature de boot invalide: {:#06x}", signature);
            return None;
        }
        if &sector[82..87] != b"FAT32" {
            debug!("tag de système de fichiers != FAT32");
            return None;
        }

        let bytes_per_sector = u16::from_le_bytes([sector[11], sector[12]]);
        let sectors_per_cluster = sector[13];
        let reserved_sectors = u16::from_le_bytes([sector[14], sector[15]]);
        let num_fats = sector[16];
        let media = sector[21];
        let total_sectors = u32::from_le_bytes([sector[32], sector[33], sector[34], sector[35]]);
        let sectors_per_fat = u32::from_le_bytes([sector[36], sector[37], sector[38], sector[39]]);
        let root_cluster = u32::from_le_bytes([sector[44], sector[45], sector[46], sector[47]]);
        let volume_id = u32::from_le_bytes([sector[67], sector[68], sector[69], sector[70]]);

        let mut volume_label = [0u8; 11];
        volume_label.copy_from_slice(&sector[71..82]);

        // Cohérence minimale, pour ne pas monter un volume inutilisable.
        if bytes_per_sector != SECTOR_SIZE as u16 {
            debug!("octets par secteur non supportés: {}", bytes_per_sector);
            return None;
        }
        if sectors_per_cluster == 0
            || reserved_sectors == 0
            || num_fats == 0
            || sectors_per_fat == 0
            || total_sectors == 0
            || root_cluster < 2
        {
            debug!("géométrie BPB incohérente");
            return None;
        }

        Some(Self {
            bytes_per_sector,
            sectors_per_cluster,
            reserved_sectors,
            num_fats,
            media,
            total_sectors,
            sectors_per_fat,
            root_cluster,
            volume_id,
            volume_label,
        })
    }

    /// Construit le secteur de boot d’un volume neuf de `total_sectors`
    /// secteurs : 8 secteurs par cluster, 32 secteurs réservés, 2 FAT,
    /// racine au cluster 2, identifiant de volume tiré de l’heure courante.
    pub fn build(total_sectors: u32) -> Self {
        let sectors_per_cluster = 8u8;
        let total_clusters = total_sectors / sectors_per_cluster as u32;
        // 4 octets par entrée de FAT, arrondi au secteur supérieur.
        let sectors_per_fat = (total_clusters * 4).div_ceil(SECTOR_SIZE as u32);

        Self {
            bytes_per_sector: SECTOR_SIZE as u16,
            sectors_per_cluster,
            reserved_sectors: 32,
            num_fats: 2,
            media: 0xF8,
            total_sectors,
            sectors_per_fat,
            root_cluster: 2,
            volume_id: Local::now().timestamp() as u32,
            volume_label: *b"NO NAME    ",
        }
    }

    /// Sérialise le secteur de boot complet, au format exact du disque.
    pub fn to_bytes(&self) -> [u8; SECTOR_SIZE] {
        let mut s = [0u8; SECTOR_SIZE];

        s[0..3].copy_from_slice(&[0xEB, 0x58, 0x90]); // jump boot
        s[3..11].copy_from_slice(b"MSWIN4.1"); // OEM
        s[11..13].copy_from_slice(&self.bytes_per_sector.to_le_bytes());
        s[13] = self.sectors_per_cluster;
        s[14..16].copy_from_slice(&self.reserved_sectors.to_le_bytes());
        s[16] = self.num_fats;
        // RootEntCnt, TotSec16 et FATSz16 restent à 0 en FAT32.
        s[21] = self.media;
        s[24..26].copy_from_slice(&32u16.to_le_bytes()); // secteurs par piste
        s[26..28].copy_from_slice(&64u16.to_le_bytes()); // têtes
        s[32..36].copy_from_slice(&self.total_sectors.to_le_bytes());
        s[36..40].copy_from_slice(&self.sectors_per_fat.to_le_bytes());
        s[44..48].copy_from_slice(&self.root_cluster.to_le_bytes());
        s[48..50].copy_from_slice(&1u16.to_le_bytes()); // secteur FSInfo
        s[50..52].copy_from_slice(&6u16.to_le_bytes()); // copie du boot
        s[64] = 0x80; // numéro de lecteur
        s[66] = 0x29; // signature de boot étendue
        s[67..71].copy_from_slice(&self.volume_id.to_le_bytes());
        s[71..82].copy_from_slice(&self.volume_label);
        s[82..90].copy_from_slice(FS_TYPE_TAG);
        s[510..512].copy_from_slice(&BOOT_SIGNATURE.to_le_bytes());

        s
    }

    /// Premier secteur de la première FAT.
    pub fn fat_start_sector(&self) -> u32 {
        self.reserved_sectors as u32
    }

    /// Premier secteur de la zone de données (après toutes les FAT).
    pub fn data_start_sector(&self) -> u32 {
        self.fat_start_sector() + self.num_fats as u32 * self.sectors_per_fat
    }

    /// Taille d’un cluster en octets.
    pub fn bytes_per_cluster(&self) -> usize {
        self.bytes_per_sector as usize * self.sectors_per_cluster as usize
    }

    /// Premier secteur du cluster `cluster`.
    ///
    /// Défini uniquement pour `cluster >= 2` : les clusters 0 et 1 sont
    /// réservés et n’adressent jamais la zone de données.
    pub fn cluster_to_sector(&self, cluster: u32) -> Result<u32, FatError> {
        if cluster < 2 || cluster > self.max_cluster() {
            return Err(FatError::InvalidCluster);
        }
        Ok((cluster - 2) * self.sectors_per_cluster as u32 + self.data_start_sector())
    }

    /// Dernier cluster adressable, borné à la fois par la zone de données
    /// et par le nombre d’entrées de la FAT.
    pub fn max_cluster(&self) -> u32 {
        let data_sectors = self.total_sectors.saturating_sub(self.data_start_sector());
        let data_clusters = data_sectors / self.sectors_per_cluster as u32;
        if data_clusters == 0 {
            return 1;
        }
        let last_by_data = 2 + data_clusters - 1;

        let fat_entries = self.sectors_per_fat * (SECTOR_SIZE as u32 / 4);
        let last_by_fat = fat_entries.saturating_sub(1);

        last_by_data.min(last_by_fat)
    }
}
