//! Accès bloc au disque émulé.
//!
//! Tout le crate travaille en secteurs de 512 octets : le secteur `n`
//! commence à l’octet `n * 512` du support. Pas de cache — chaque appel
//! va directement au support, c’est à l’appelant de gérer la visibilité
//! de ses écritures.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::debug;

use crate::FatError;

/// Taille d’un secteur en octets. FAT32 tel qu’on l’émule ici impose 512.
pub const SECTOR_SIZE: usize = 512;

/// Un support dont on lit et écrit des secteurs entiers.
///
/// Les deux opérations transfèrent exactement 512 octets ou échouent :
/// une lecture courte signifie une image tronquée, une écriture courte
/// une erreur du système hôte. Rien n’est retenté.
pub trait BlockDevice {
    /// Nombre de secteurs adressables sur le support.
    fn sector_count(&self) -> u32;

    /// Lit le secteur `sector` dans `buf`.
    fn read_sector(&mut self, sector: u32, buf: &mut [u8; SECTOR_SIZE]) -> Result<(), FatError>;

    /// Écrit `buf` dans le secteur `sector`.
    fn write_sector(&mut self, sector: u32, buf: &[u8; SECTOR_SIZE]) -> Result<(), FatError>;
}

/// Image disque sur un vrai fichier hôte.
///
/// Chaque accès fait un `seek` puis un transfert exact de 512 octets.
pub struct FileDisk {
    file: File,
    sectors: u32,
}

impl FileDisk {
    /// Ouvre une image existante en lecture/écriture.
    pub fn open(path: &Path) -> Result<Self, FatError> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let len = file.metadata()?.len();
        debug!("image ouverte: {} octets", len);
        Ok(Self {
            file,
            sectors: (len / SECTOR_SIZE as u64) as u32,
        })
    }

    /// Crée une image remplie de zéros de `size_bytes` octets, puis l’ouvre.
    pub fn create(path: &Path, size_bytes: u64) -> Result<Self, FatError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(size_bytes)?;
        debug!("image créée: {} octets", size_bytes);
        Ok(Self {
            file,
            sectors: (size_bytes / SECTOR_SIZE as u64) as u32,
        })
    }
}

impl BlockDevice for FileDisk {
    fn sector_count(&self) -> u32 {
        self.sectors
    }

    fn read_sector(&mut self, sector: u32, buf: &mut [u8; SECTOR_SIZE]) -> Result<(), FatError> {
        if sector >= self.sectors {
            return Err(FatError::ImageTruncated);
        }
        self.file
            .seek(SeekFrom::Start(sector as u64 * SECTOR_SIZE as u64))?;
        match self.file.read_exact(buf) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(FatError::ImageTruncated),
            Err(e) => Err(FatError::Io(e)),
        }
    }

    fn write_sector(&mut self, sector: u32, buf: &[u8; SECTOR_SIZE]) -> Result<(), FatError> {
        if sector >= self.sectors {
            return Err(FatError::ImageTruncated);
        }
        self.file
            .seek(SeekFrom::Start(sector as u64 * SECTOR_SIZE as u64))?;
        self.file.write_all(buf)?;
        Ok(())
    }
}

/// Image disque en mémoire, surtout pour les tests.
pub struct RamDisk {
    data: Vec<u8>,
}

impl RamDisk {
    /// Crée une image remplie de zéros de `size_bytes` octets.
    pub fn new(size_bytes: usize) -> Self {
        Self {
            data: vec![0u8; size_bytes],
        }
    }
}

impl BlockDevice for RamDisk {
    fn sector_count(&self) -> u32 {
        (self.data.len() / SECTOR_SIZE) as u32
    }

    fn read_sector(&mut self, sector: u32, buf: &mut [u8; SECTOR_SIZE]) -> Result<(), FatError> {
        let off = sector as usize * SECTOR_SIZE;
        if off + SECTOR_SIZE > self.data.len() {
            return Err(FatError::ImageTruncated);
        }
        buf.copy_from_slice(&self.data[off..off + SECTOR_SIZE]);
        Ok(())
    }

    fn write_sector(&mut self, sector: u32, buf: &[u8; SECTOR_SIZE]) -> Result<(), FatError> {
        let off = sector as usize * SECTOR_SIZE;
        if off + SECTOR_SIZE > self.data.len() {
            return Err(FatError::ImageTruncated);
        }
        self.data[off..off + SECTOR_SIZE].copy_from_slice(buf);
        Ok(())
    }
}
