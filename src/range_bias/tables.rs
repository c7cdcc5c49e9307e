//! Distance dependent range bias tables for 64 MHz PRF
//!
//! Each bucket holds the upper bound of a distance range and the correction
//! that applies within it, both in centimetres. The last bucket is open-ended.

use super::Bucket;

const fn b(upper_cm: u16, correction_cm: i8) -> Bucket {
    Bucket { upper_cm, correction_cm }
}

/// Channel 2
pub static CHANNEL2_PRF64: [Bucket; 24] = [
    b(25, -17), b(50, -16), b(75, -14), b(100, -13), b(150, -11), b(225, -10),
    b(300, -9), b(350, -8), b(425, -7), b(475, -6), b(525, -5), b(600, -4),
    b(650, -3), b(700, -2), b(775, -1), b(825, 0), b(925, 1), b(1050, 2),
    b(1225, 3), b(1700, 4), b(2225, 5), b(2625, 6), b(3450, 7), b(65535, 8),
];

/// Channel 3
pub static CHANNEL3_PRF64: [Bucket; 24] = [
    b(25, -17), b(50, -15), b(75, -14), b(100, -12), b(125, -11), b(200, -10),
    b(250, -9), b(325, -8), b(375, -7), b(425, -6), b(475, -5), b(525, -4),
    b(575, -3), b(625, -2), b(675, -1), b(750, 0), b(825, 1), b(925, 2),
    b(1100, 3), b(1500, 4), b(1975, 5), b(2325, 6), b(3050, 7), b(65535, 8),
];

/// Channel 5
pub static CHANNEL5_PRF64: [Bucket; 23] = [
    b(25, -17), b(50, -14), b(75, -12), b(100, -11), b(150, -10), b(175, -9),
    b(225, -8), b(250, -7), b(300, -6), b(325, -5), b(375, -4), b(400, -3),
    b(425, -2), b(475, -1), b(525, 0), b(575, 1), b(650, 2), b(750, 3),
    b(1050, 4), b(1375, 5), b(1625, 6), b(2125, 7), b(65535, 8),
];
