/*
 *  word.rs
 *
 *  LyMonS - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  16-bit word <-> 2-byte conversions for register payloads
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WordError {
    #[error("can only convert 2 bytes to a 16 bit word, got {0}")]
    Length(usize),
    #[error("word has to be between 0 and 65535, got {0}")]
    Range(i32),
}

/// Big-endian (most significant byte first) 2-byte sequence to word
pub fn bytes_to_word(bytes: &[u8]) -> Result<u16, WordError> {
    let pair: [u8; 2] = bytes.try_into().map_err(|_| WordError::Length(bytes.len()))?;
    Ok(u16::from_be_bytes(pair))
}

/// Word in 0..=65535 to a big-endian 2-byte sequence
pub fn word_to_bytes(word: i32) -> Result<[u8; 2], WordError> {
    let word = u16::try_from(word).map_err(|_| WordError::Range(word))?;
    Ok(word.to_be_bytes())
}
